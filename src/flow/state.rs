use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overall state of an assembled flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Established, // Handshake completed, no close observed
    Closed,      // FIN/FIN/ACK observed
    Reset,       // Torn down by RST
    Invalid,     // Handshake could not be validated
    Unknown,     // Never established, or only half closed
}

/// How the connection ended, as far as the capture shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseType {
    Graceful,
    Abortive,
    Open,
    Invalid,
    HalfClose,
}

/// Root cause of an invalid handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    AckWithoutHandshake,
    OrphanSynTimeout,
    OrphanSynackTimeout,
    BadSeqAckNumbers,
    RstDuringHandshake,
    /// Catch-all for invalid flows without a derivable cause. The classifier
    /// never produces it; aggregation uses it for reason-less invalid flows.
    UnknownInvalid,
}

/// Why and when a handshake was judged invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub reason: InvalidReason,
    pub at: u64,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Established => "established",
            ConnectionState::Closed => "closed",
            ConnectionState::Reset => "reset",
            ConnectionState::Invalid => "invalid",
            ConnectionState::Unknown => "unknown",
        }
    }
}

impl CloseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseType::Graceful => "graceful",
            CloseType::Abortive => "abortive",
            CloseType::Open => "open",
            CloseType::Invalid => "invalid",
            CloseType::HalfClose => "half_close",
        }
    }
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::AckWithoutHandshake => "ack_without_handshake",
            InvalidReason::OrphanSynTimeout => "orphan_syn_timeout",
            InvalidReason::OrphanSynackTimeout => "orphan_synack_timeout",
            InvalidReason::BadSeqAckNumbers => "bad_seq_ack_numbers",
            InvalidReason::RstDuringHandshake => "rst_during_handshake",
            InvalidReason::UnknownInvalid => "unknown_invalid",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CloseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graceful" => Ok(CloseType::Graceful),
            "abortive" => Ok(CloseType::Abortive),
            "open" => Ok(CloseType::Open),
            "invalid" => Ok(CloseType::Invalid),
            "half_close" => Ok(CloseType::HalfClose),
            other => Err(format!("unknown close type: {}", other)),
        }
    }
}

impl FromStr for InvalidReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ack_without_handshake" => Ok(InvalidReason::AckWithoutHandshake),
            "orphan_syn_timeout" => Ok(InvalidReason::OrphanSynTimeout),
            "orphan_synack_timeout" => Ok(InvalidReason::OrphanSynackTimeout),
            "bad_seq_ack_numbers" => Ok(InvalidReason::BadSeqAckNumbers),
            "rst_during_handshake" => Ok(InvalidReason::RstDuringHandshake),
            "unknown_invalid" => Ok(InvalidReason::UnknownInvalid),
            other => Err(format!("unknown invalid reason: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names_match_display() {
        for reason in [
            InvalidReason::AckWithoutHandshake,
            InvalidReason::OrphanSynTimeout,
            InvalidReason::OrphanSynackTimeout,
            InvalidReason::BadSeqAckNumbers,
            InvalidReason::RstDuringHandshake,
            InvalidReason::UnknownInvalid,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason));
        }

        assert_eq!(serde_json::to_string(&CloseType::HalfClose).unwrap(), "\"half_close\"");
        assert_eq!(serde_json::to_string(&ConnectionState::Reset).unwrap(), "\"reset\"");
    }

    #[test]
    fn test_parse_from_json_string() {
        let reason: InvalidReason = serde_json::from_str("\"orphan_synack_timeout\"").unwrap();
        assert_eq!(reason, InvalidReason::OrphanSynackTimeout);
        let close: CloseType = serde_json::from_str("\"graceful\"").unwrap();
        assert_eq!(close, CloseType::Graceful);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("half_close".parse::<CloseType>(), Ok(CloseType::HalfClose));
        assert_eq!("rst_during_handshake".parse::<InvalidReason>(), Ok(InvalidReason::RstDuringHandshake));
        assert!("closed".parse::<CloseType>().is_err());
    }
}
