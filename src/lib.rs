//! Rebuilds TCP connections from captured packet metadata and classifies
//! how each one opened and closed.

pub mod capture;
pub mod flow;
pub mod tcp;
