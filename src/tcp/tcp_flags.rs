use bitflags::bitflags;

bitflags! {
    // Bit positions [ CWR, ECE, URG, ACK, PSH, RST, SYN, FIN ]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TcpFlags: u8 {
        const CWR = 1 << 7;
        const ECE = 1 << 6;
        const URG = 1 << 5;
        const ACK = 1 << 4;
        const PSH = 1 << 3;
        const RST = 1 << 2;
        const SYN = 1 << 1;
        const FIN = 1 << 0;
    }
}

/// The role a segment can play in connection setup or teardown.
///
/// Every flag combination maps to exactly one kind, so the state machines
/// match on this instead of testing bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Rst,    // RST set, whatever else is set
    SynAck, // SYN + ACK
    Syn,    // SYN without ACK
    Fin,    // FIN, usually with ACK
    Ack,    // ACK without SYN/FIN/RST; may carry payload
    Bare,   // No control bits at all
}

impl TcpFlags {
    /// Classify the flag set into a single `Segment` kind.
    pub fn segment(&self) -> Segment {
        if self.contains(TcpFlags::RST) {
            Segment::Rst
        } else if self.contains(TcpFlags::SYN) {
            if self.contains(TcpFlags::ACK) {
                Segment::SynAck
            } else {
                Segment::Syn
            }
        } else if self.contains(TcpFlags::FIN) {
            Segment::Fin
        } else if self.contains(TcpFlags::ACK) {
            Segment::Ack
        } else {
            Segment::Bare
        }
    }
}

/// Serialize `TcpFlags` as the raw header byte. Unknown bits are dropped on read.
pub mod bits {
    use super::TcpFlags;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flags: &TcpFlags, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(flags.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TcpFlags, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Ok(TcpFlags::from_bits_truncate(raw))
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use crate::tcp::tcp_flags::{Segment, TcpFlags};

    #[test]
    fn test_tcp_flags() {
        assert_eq!(TcpFlags::FIN.bits(), 0b00000001);
        assert_eq!(TcpFlags::SYN.bits(), 0b00000010);
        assert_eq!(TcpFlags::RST.bits(), 0b00000100);
        assert_eq!(TcpFlags::PSH.bits(), 0b00001000);
        assert_eq!(TcpFlags::ACK.bits(), 0b00010000);
        assert_eq!(TcpFlags::URG.bits(), 0b00100000);
        assert_eq!(TcpFlags::ECE.bits(), 0b01000000);
        assert_eq!(TcpFlags::CWR.bits(), 0b10000000);
    }

    // -- Test segment kinds --

    #[test]
    fn test_segment_handshake_kinds() {
        assert_eq!(TcpFlags::SYN.segment(), Segment::Syn);
        assert_eq!((TcpFlags::SYN | TcpFlags::ACK).segment(), Segment::SynAck);
        assert_eq!(TcpFlags::ACK.segment(), Segment::Ack);
        assert_eq!((TcpFlags::ACK | TcpFlags::PSH).segment(), Segment::Ack);
    }

    #[test]
    fn test_segment_rst_wins() {
        assert_eq!(TcpFlags::RST.segment(), Segment::Rst);
        assert_eq!((TcpFlags::RST | TcpFlags::ACK).segment(), Segment::Rst);
        assert_eq!((TcpFlags::RST | TcpFlags::SYN).segment(), Segment::Rst);
        assert_eq!((TcpFlags::RST | TcpFlags::FIN).segment(), Segment::Rst);
    }

    #[test]
    fn test_segment_fin_and_bare() {
        assert_eq!(TcpFlags::FIN.segment(), Segment::Fin);
        assert_eq!((TcpFlags::FIN | TcpFlags::ACK).segment(), Segment::Fin);
        assert_eq!(TcpFlags::empty().segment(), Segment::Bare);
        assert_eq!(TcpFlags::PSH.segment(), Segment::Bare);
    }

    #[test]
    fn test_segment_every_byte_has_a_kind() {
        for raw in 0..=u8::MAX {
            let flags = TcpFlags::from_bits_truncate(raw);
            let kind = flags.segment();
            if raw & 0x04 != 0 {
                assert_eq!(kind, Segment::Rst);
            } else if raw & 0x02 != 0 {
                assert!(matches!(kind, Segment::Syn | Segment::SynAck));
            }
        }
    }

    // -- Test serde --

    #[test]
    fn test_bits_serde() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Holder {
            #[serde(with = "crate::tcp::tcp_flags::bits")]
            flags: TcpFlags,
        }

        let json = serde_json::to_string(&Holder { flags: TcpFlags::SYN | TcpFlags::ACK }).unwrap();
        assert_eq!(json, r#"{"flags":18}"#);

        let holder: Holder = serde_json::from_str(r#"{"flags":17}"#).unwrap();
        assert_eq!(holder.flags, TcpFlags::FIN | TcpFlags::ACK);
    }
}
