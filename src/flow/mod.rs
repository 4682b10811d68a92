pub mod assembler;
pub mod classifier;
pub mod closing;
pub mod config;
pub mod connection_key;
pub mod errors;
pub mod filter;
pub mod handshake;
pub mod state;
pub mod summary;
pub mod tracker;
pub mod validate;

#[cfg(test)]
mod testing;

// -- Re-export structs for more concise usage

pub use assembler::Flow;
pub use classifier::{classify, ConnectionClassifier, FlowClassifier};
pub use closing::{CloseOutcome, ClosingTracker};
pub use config::ClassifierConfig;
pub use connection_key::{group_by_connection, ConnectionKey, Orientation};
pub use errors::FlowError;
pub use filter::FlowFilter;
pub use handshake::{HandshakeStatus, HandshakeTracker};
pub use state::{CloseType, ConnectionState, InvalidReason};
pub use summary::FlowSummary;
pub use tracker::FlowTracker;
