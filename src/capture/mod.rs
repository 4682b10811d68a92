pub mod endpoint;
pub mod packet;

// -- Re-export structs for more concise usage

pub use endpoint::Endpoint;
pub use packet::Packet;
