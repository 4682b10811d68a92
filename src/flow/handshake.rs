use crate::capture::Packet;
use crate::flow::config::ClassifierConfig;
use crate::flow::state::{InvalidReason, InvalidRecord};
use crate::flow::validate;
use crate::tcp::tcp_flags::Segment;
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    New,         // Nothing recognised yet
    SynSeen,     // SYN recorded, waiting for SYN+ACK
    SynAckSeen,  // SYN+ACK recorded, waiting for the final ACK
    Established, // Terminal: three-way handshake validated
    Invalid,     // Terminal: see `InvalidRecord`
}

/// Validates the three-way handshake of one connection.
///
/// Owned by exactly one connection. Packets that cannot be placed yet
/// (a SYN+ACK or ACK before the SYN) wait in a bounded pending buffer and are
/// replayed whenever the handshake advances.
#[derive(Debug, Clone)]
pub struct HandshakeTracker {
    config: ClassifierConfig,
    status: HandshakeStatus,
    syn: Option<Packet>,
    syn_ack: Option<Packet>,
    ack: Option<Packet>,
    pending: VecDeque<Packet>,
    syn_expire: Option<u64>,
    syn_ack_expire: Option<u64>,
    invalid: Option<InvalidRecord>,
}

impl HandshakeTracker {
    pub fn new(config: ClassifierConfig) -> Self {
        HandshakeTracker {
            config,
            status: HandshakeStatus::New,
            syn: None,
            syn_ack: None,
            ack: None,
            pending: VecDeque::new(),
            syn_expire: None,
            syn_ack_expire: None,
            invalid: None,
        }
    }

    pub fn status(&self) -> HandshakeStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, HandshakeStatus::Established | HandshakeStatus::Invalid)
    }

    pub fn is_established(&self) -> bool {
        self.status == HandshakeStatus::Established
    }

    pub fn invalid(&self) -> Option<InvalidRecord> {
        self.invalid
    }

    pub fn syn(&self) -> Option<&Packet> {
        self.syn.as_ref()
    }

    pub fn syn_ack(&self) -> Option<&Packet> {
        self.syn_ack.as_ref()
    }

    pub fn final_ack(&self) -> Option<&Packet> {
        self.ack.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed the next packet in timestamp order. Returns `true` if the
    /// handshake completed while processing this packet.
    pub fn observe(&mut self, packet: &Packet) -> bool {
        if self.is_terminal() {
            return false;
        }

        let now = packet.timestamp;
        self.check_timers(now);
        if self.is_terminal() {
            return false;
        }

        self.dispatch(packet.clone(), now);
        self.is_established()
    }

    /// No more packets will arrive; run the timers one last time at `capture_end`.
    /// Buffered packets still waiting for a SYN are judged here as well.
    pub fn finalize(&mut self, capture_end: u64) {
        if self.is_terminal() {
            return;
        }
        self.check_timers(capture_end);
        if self.status == HandshakeStatus::New && self.pending_aged(capture_end) {
            self.fail(self.unrecoverable_reason(), capture_end);
        }
    }

    /// Passive expiry checks, evaluated before every packet.
    fn check_timers(&mut self, now: u64) {
        match self.status {
            HandshakeStatus::SynSeen => {
                if self.syn_expire.is_some_and(|expire| now > expire) {
                    self.fail(InvalidReason::OrphanSynTimeout, now);
                }
            }
            HandshakeStatus::SynAckSeen => {
                if self.syn_ack_expire.is_some_and(|expire| now > expire) {
                    self.fail(InvalidReason::OrphanSynackTimeout, now);
                }
            }
            HandshakeStatus::New | HandshakeStatus::Established | HandshakeStatus::Invalid => {}
        }
    }

    fn dispatch(&mut self, packet: Packet, now: u64) {
        match (packet.segment(), self.status) {
            (_, HandshakeStatus::Established | HandshakeStatus::Invalid) => {}
            (Segment::Rst, _) => self.fail(InvalidReason::RstDuringHandshake, now),
            (Segment::Syn, _) => self.on_syn(packet, now),
            (Segment::SynAck, HandshakeStatus::SynSeen) => self.on_syn_ack(packet, now),
            (Segment::SynAck, HandshakeStatus::New) => self.buffer(packet, now),
            (Segment::SynAck, HandshakeStatus::SynAckSeen) => {} // Retransmission
            (Segment::Ack, HandshakeStatus::SynAckSeen) => self.on_final_ack(packet, now),
            (Segment::Ack, HandshakeStatus::New | HandshakeStatus::SynSeen) => self.buffer(packet, now),
            (Segment::Fin | Segment::Bare, _) => {}
        }
    }

    fn on_syn(&mut self, packet: Packet, now: u64) {
        // A retransmitted SYN keeps the original timer
        if let Some(syn) = &self.syn {
            if syn.seq_no == packet.seq_no && syn.src_port == packet.src_port && syn.src_ip == packet.src_ip {
                return;
            }
        }

        trace!(seq = %packet.seq_no, at = now, "SYN recorded");
        self.syn = Some(packet);
        self.syn_ack = None;
        self.syn_ack_expire = None;
        self.syn_expire = Some(now.saturating_add(self.config.handshake_timeout_ms));
        self.status = HandshakeStatus::SynSeen;
        self.replay_pending(now);
    }

    fn on_syn_ack(&mut self, packet: Packet, now: u64) {
        trace!(seq = %packet.seq_no, ack = %packet.ack_no, at = now, "SYN+ACK recorded");
        // A replayed SYN+ACK keeps the deadline of its own capture time
        self.syn_ack_expire = Some(packet.timestamp.saturating_add(self.config.handshake_timeout_ms));
        self.syn_ack = Some(packet);
        self.syn_expire = None;
        self.status = HandshakeStatus::SynAckSeen;
        self.replay_pending(now);
    }

    fn on_final_ack(&mut self, packet: Packet, now: u64) {
        let (Some(syn), Some(syn_ack)) = (&self.syn, &self.syn_ack) else {
            self.buffer(packet, now);
            return;
        };

        match validate::check_handshake(syn, syn_ack, &packet) {
            Ok(()) => {
                debug!(at = now, "handshake established");
                self.ack = Some(packet);
                self.status = HandshakeStatus::Established;
                self.pending.clear();
                self.syn_expire = None;
                self.syn_ack_expire = None;
            }
            Err(mismatch) => {
                trace!(%mismatch, "final ACK rejected");
                self.fail(InvalidReason::BadSeqAckNumbers, now);
            }
        }
    }

    /// Hold a packet that arrived ahead of the packet it depends on. Before a
    /// SYN is seen the buffer is also bounded in age.
    fn buffer(&mut self, packet: Packet, now: u64) {
        let reason = self.buffer_reason(packet.segment());
        trace!(pending = self.pending.len() + 1, at = now, "packet buffered");
        self.pending.push_back(packet);

        let overflow = self.pending.len() > self.config.reorder_window_pkts;
        let aged = self.status == HandshakeStatus::New && self.pending_aged(now);
        if overflow || aged {
            self.fail(reason, now);
        }
    }

    fn pending_aged(&self, now: u64) -> bool {
        self.pending
            .front()
            .is_some_and(|oldest| now.saturating_sub(oldest.timestamp) > self.config.reorder_window_ms)
    }

    /// Re-dispatch buffered packets after the handshake advanced.
    fn replay_pending(&mut self, now: u64) {
        let pending = std::mem::take(&mut self.pending);
        for packet in pending {
            if self.is_terminal() {
                break;
            }
            if now.saturating_sub(packet.timestamp) > self.config.reorder_window_ms {
                trace!(at = packet.timestamp, "stale pending packet dropped");
                continue;
            }
            self.dispatch(packet, now);
        }
    }

    /// Reason reported when the packet being buffered cannot be placed.
    fn buffer_reason(&self, segment: Segment) -> InvalidReason {
        match (self.status, segment) {
            (HandshakeStatus::SynSeen, _) => InvalidReason::OrphanSynTimeout,
            (_, Segment::SynAck) => InvalidReason::OrphanSynackTimeout,
            _ => InvalidReason::AckWithoutHandshake,
        }
    }

    /// Reason reported at capture end for packets that never saw their SYN.
    fn unrecoverable_reason(&self) -> InvalidReason {
        match self.pending.front().map(Packet::segment) {
            Some(Segment::SynAck) => InvalidReason::OrphanSynackTimeout,
            _ => InvalidReason::AckWithoutHandshake,
        }
    }

    fn fail(&mut self, reason: InvalidReason, at: u64) {
        debug!(%reason, at, "handshake invalid");
        self.status = HandshakeStatus::Invalid;
        self.invalid = Some(InvalidRecord { reason, at });
        self.pending.clear();
        self.syn_expire = None;
        self.syn_ack_expire = None;
    }
}

// -- Unit tests --
