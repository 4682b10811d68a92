//! Sequence-number checks shared by the handshake and closing trackers, so
//! both agree on when a connection is established.

use crate::capture::Packet;
use crate::tcp::tcp_flags::TcpFlags;
use crate::tcp::wrap32::Wrap32;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqMismatch {
    #[error("SYN+ACK acknowledges {got}, expected {expected}")]
    SynAck { expected: Wrap32, got: Wrap32 },

    #[error("final ACK acknowledges {got}, expected {expected}")]
    FinalAck { expected: Wrap32, got: Wrap32 },
}

/// `syn_ack.ack == syn.seq + 1 (mod 2^32)`
pub fn check_syn_ack(syn: &Packet, syn_ack: &Packet) -> Result<(), SeqMismatch> {
    let expected = syn.seq_no + 1u32;
    if syn_ack.ack_no != expected {
        return Err(SeqMismatch::SynAck { expected, got: syn_ack.ack_no });
    }
    Ok(())
}

/// `ack.ack == syn_ack.seq + 1 (mod 2^32)`
pub fn check_final_ack(syn_ack: &Packet, ack: &Packet) -> Result<(), SeqMismatch> {
    let expected = syn_ack.seq_no + 1u32;
    if ack.ack_no != expected {
        return Err(SeqMismatch::FinalAck { expected, got: ack.ack_no });
    }
    Ok(())
}

/// Both numbers of a complete three-way handshake.
pub fn check_handshake(syn: &Packet, syn_ack: &Packet, ack: &Packet) -> Result<(), SeqMismatch> {
    check_final_ack(syn_ack, ack)?;
    check_syn_ack(syn, syn_ack)
}

/// True if `ack` comes from the other side and acknowledges everything up to and including `fin`.
pub fn acknowledges_fin(fin: &Packet, ack: &Packet) -> bool {
    ack.flags.contains(TcpFlags::ACK)
        && ack.is_reply_to(fin)
        && ack.ack_no == fin.seq_no.next_after_control(fin.payload_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Endpoint;

    fn client() -> Endpoint {
        Endpoint::v4(192, 168, 0, 2, 40000)
    }

    fn server() -> Endpoint {
        Endpoint::v4(192, 168, 0, 1, 22)
    }

    fn triple(syn_seq: u32, syn_ack_seq: u32, syn_ack_ack: u32, ack_ack: u32) -> (Packet, Packet, Packet) {
        (
            Packet::new(0, client(), server(), TcpFlags::SYN).seq_no(syn_seq),
            Packet::new(1, server(), client(), TcpFlags::SYN | TcpFlags::ACK)
                .seq_no(syn_ack_seq)
                .ack_no(syn_ack_ack),
            Packet::new(2, client(), server(), TcpFlags::ACK)
                .seq_no(syn_seq.wrapping_add(1))
                .ack_no(ack_ack),
        )
    }

    #[test]
    fn test_valid_handshake() {
        let (syn, syn_ack, ack) = triple(100, 500, 101, 501);
        assert_eq!(check_handshake(&syn, &syn_ack, &ack), Ok(()));
    }

    #[test]
    fn test_wrapped_syn_seq() {
        let (syn, syn_ack, ack) = triple(u32::MAX, 7, 0, 8);
        assert_eq!(check_handshake(&syn, &syn_ack, &ack), Ok(()));
    }

    #[test]
    fn test_wrapped_syn_ack_seq() {
        let (syn, syn_ack, ack) = triple(42, u32::MAX, 43, 0);
        assert_eq!(check_handshake(&syn, &syn_ack, &ack), Ok(()));
    }

    #[test]
    fn test_bad_final_ack() {
        let (syn, syn_ack, ack) = triple(100, 500, 101, 600);
        assert_eq!(
            check_handshake(&syn, &syn_ack, &ack),
            Err(SeqMismatch::FinalAck { expected: Wrap32::new(501), got: Wrap32::new(600) })
        );
    }

    #[test]
    fn test_bad_syn_ack() {
        let (syn, syn_ack, ack) = triple(100, 500, 100, 501);
        assert_eq!(
            check_handshake(&syn, &syn_ack, &ack),
            Err(SeqMismatch::SynAck { expected: Wrap32::new(101), got: Wrap32::new(100) })
        );
    }

    #[test]
    fn test_mismatch_message() {
        let err = SeqMismatch::FinalAck { expected: Wrap32::new(1), got: Wrap32::new(2) };
        assert_eq!(err.to_string(), "final ACK acknowledges 2, expected 1");
    }

    // -- Test FIN acknowledgement --

    #[test]
    fn test_acknowledges_fin() {
        let fin = Packet::new(10, client(), server(), TcpFlags::FIN | TcpFlags::ACK).seq_no(900);
        let ack = Packet::new(11, server(), client(), TcpFlags::ACK).ack_no(901);
        assert!(acknowledges_fin(&fin, &ack));
    }

    #[test]
    fn test_acknowledges_fin_with_payload() {
        let fin = Packet::new(10, client(), server(), TcpFlags::FIN | TcpFlags::ACK)
            .seq_no(900)
            .payload_len(100);
        let short = Packet::new(11, server(), client(), TcpFlags::ACK).ack_no(901);
        let full = Packet::new(12, server(), client(), TcpFlags::ACK).ack_no(1001);
        assert!(!acknowledges_fin(&fin, &short));
        assert!(acknowledges_fin(&fin, &full));
    }

    #[test]
    fn test_same_direction_does_not_acknowledge_fin() {
        let fin = Packet::new(10, client(), server(), TcpFlags::FIN).seq_no(u32::MAX);
        let ack = Packet::new(11, client(), server(), TcpFlags::ACK).ack_no(0);
        assert!(!acknowledges_fin(&fin, &ack));

        let reply = Packet::new(11, server(), client(), TcpFlags::ACK).ack_no(0);
        assert!(acknowledges_fin(&fin, &reply));
    }

    #[test]
    fn test_ack_flag_required() {
        let fin = Packet::new(10, client(), server(), TcpFlags::FIN).seq_no(5);
        let bare = Packet::new(11, server(), client(), TcpFlags::PSH).ack_no(6);
        assert!(!acknowledges_fin(&fin, &bare));
    }
}
