use crate::flow::errors::FlowError;
use serde::{Deserialize, Serialize};

/// Default `HANDSHAKE_TIMEOUT_MS`.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 3_000;
/// Default `REORDER_WINDOW_PKTS`.
pub const REORDER_WINDOW_PKTS: usize = 16;
/// Default `REORDER_WINDOW_MS`.
pub const REORDER_WINDOW_MS: u64 = 1_000;
/// Default idle time after which the streaming tracker finalizes a connection.
pub const IDLE_TIMEOUT_MS: u64 = 300_000;

/// Tunables of the classifier, all in capture-clock milliseconds.
///
/// These move the false-positive/false-negative balance of the handshake
/// checks. A short `handshake_timeout_ms` turns slow but healthy handshakes
/// into `orphan_syn_timeout`; a small reorder window turns reordered captures
/// into `ack_without_handshake`. Callers should log the values they run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Max time a half-completed handshake may stay pending.
    pub handshake_timeout_ms: u64,
    /// Max number of out-of-order handshake packets buffered per connection.
    pub reorder_window_pkts: usize,
    /// Max age of the oldest buffered packet before it is judged unrecoverable.
    pub reorder_window_ms: u64,
    /// Streaming only: idle time before a connection is finalized.
    pub idle_timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            handshake_timeout_ms: HANDSHAKE_TIMEOUT_MS,
            reorder_window_pkts: REORDER_WINDOW_PKTS,
            reorder_window_ms: REORDER_WINDOW_MS,
            idle_timeout_ms: IDLE_TIMEOUT_MS,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.handshake_timeout_ms == 0 {
            return Err(FlowError::InvalidConfig("handshake_timeout_ms must be > 0".into()));
        }
        if self.reorder_window_pkts == 0 {
            return Err(FlowError::InvalidConfig("reorder_window_pkts must be > 0".into()));
        }
        if self.reorder_window_ms == 0 {
            return Err(FlowError::InvalidConfig("reorder_window_ms must be > 0".into()));
        }
        if self.idle_timeout_ms < self.handshake_timeout_ms {
            return Err(FlowError::InvalidConfig(format!(
                "idle_timeout_ms ({}) must not be shorter than handshake_timeout_ms ({})",
                self.idle_timeout_ms, self.handshake_timeout_ms
            )));
        }
        Ok(())
    }
}
