pub mod tcp_flags;
pub mod wrap32;

// -- Re-export structs for more concise usage

pub use tcp_flags::{Segment, TcpFlags};
pub use wrap32::Wrap32;
