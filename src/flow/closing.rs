use crate::capture::Packet;
use crate::flow::validate;
use crate::tcp::tcp_flags::Segment;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosingState {
    // -- Opening states --
    #[default]
    New,     // Nothing seen
    Init,    // SYN seen
    SynRcvd, // Valid SYN+ACK seen

    // -- Steady state; opened --
    Est, // Valid final ACK seen

    // -- Closing states --
    Fin1,    // First FIN seen
    Fin2,    // FIN seen from both sides
    Closed,  // Second FIN acknowledged
    Aborted, // RST after establishment
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Fin,
    Rst,
}

/// What the closing tracker concludes once the capture is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    Aborted,
    HalfClose,
    Open,
}

/// Follows a connection from handshake to teardown and recognises the
/// closing pattern. Opening validity goes through the same checks as
/// `HandshakeTracker`.
#[derive(Debug, Clone, Default)]
pub struct ClosingTracker {
    state: ClosingState,
    syn: Option<Packet>,
    syn_ack: Option<Packet>,
    first_fin: Option<Packet>,
    second_fin: Option<Packet>,
    last_ack: Option<Packet>,
    rst: Option<Packet>,
    first_fin_acked: bool,
    close_reason: Option<CloseReason>,
}

impl ClosingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClosingState {
        self.state
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ClosingState::Closed | ClosingState::Aborted)
    }

    /// The FIN, RST and final ACK packets that make up the closing pattern, in order.
    pub fn closing_packets(&self) -> Vec<&Packet> {
        [&self.first_fin, &self.second_fin, &self.last_ack, &self.rst]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Feed the next packet. Returns `true` if this packet started the
    /// closing phase (first FIN or RST after establishment).
    pub fn observe(&mut self, packet: &Packet) -> bool {
        let segment = packet.segment();
        match self.state {
            ClosingState::New => {
                if segment == Segment::Syn {
                    self.syn = Some(packet.clone());
                    self.state = ClosingState::Init;
                }
                false
            }
            ClosingState::Init => {
                match segment {
                    Segment::Syn => self.syn = Some(packet.clone()),
                    Segment::SynAck => self.on_syn_ack(packet),
                    _ => {}
                }
                false
            }
            ClosingState::SynRcvd => {
                match segment {
                    Segment::Syn => self.restart(packet),
                    Segment::Ack => self.on_final_ack(packet),
                    _ => {}
                }
                false
            }
            ClosingState::Est => match segment {
                Segment::Rst => {
                    self.abort(packet);
                    true
                }
                Segment::Fin => {
                    trace!(at = packet.timestamp, "first FIN");
                    self.first_fin = Some(packet.clone());
                    self.state = ClosingState::Fin1;
                    true
                }
                _ => false,
            },
            ClosingState::Fin1 => {
                self.on_fin1(segment, packet);
                false
            }
            ClosingState::Fin2 => {
                self.on_fin2(segment, packet);
                false
            }
            ClosingState::Closed | ClosingState::Aborted => false,
        }
    }

    /// Force EST when the handshake tracker validated the handshake from
    /// reordered packets this tracker could not place.
    pub fn sync_established(&mut self) {
        if matches!(self.state, ClosingState::New | ClosingState::Init | ClosingState::SynRcvd) {
            trace!("closing tracker synchronised to EST");
            self.state = ClosingState::Est;
        }
    }

    pub fn finalize(&self) -> CloseOutcome {
        match self.state {
            ClosingState::Closed => CloseOutcome::Closed,
            ClosingState::Aborted => CloseOutcome::Aborted,
            ClosingState::Fin1 if self.first_fin_acked => CloseOutcome::HalfClose,
            _ => CloseOutcome::Open,
        }
    }

    fn on_syn_ack(&mut self, packet: &Packet) {
        let Some(syn) = &self.syn else {
            return;
        };
        if validate::check_syn_ack(syn, packet).is_ok() {
            self.syn_ack = Some(packet.clone());
            self.state = ClosingState::SynRcvd;
        }
    }

    fn on_final_ack(&mut self, packet: &Packet) {
        let (Some(syn), Some(syn_ack)) = (&self.syn, &self.syn_ack) else {
            return;
        };
        if validate::check_handshake(syn, syn_ack, packet).is_ok() {
            self.state = ClosingState::Est;
        }
    }

    /// A SYN with a new ISN after the SYN+ACK starts over.
    fn restart(&mut self, packet: &Packet) {
        let retransmit = self.syn.as_ref().is_some_and(|syn| syn.seq_no == packet.seq_no);
        if !retransmit {
            self.syn = Some(packet.clone());
            self.syn_ack = None;
            self.state = ClosingState::Init;
        }
    }

    fn on_fin1(&mut self, segment: Segment, packet: &Packet) {
        let Some(first_fin) = &self.first_fin else {
            return;
        };

        let acked = validate::acknowledges_fin(first_fin, packet);
        let reply = packet.is_reply_to(first_fin);
        if acked {
            self.first_fin_acked = true;
        }

        match segment {
            Segment::Rst => self.abort(packet),
            Segment::Fin if reply => {
                trace!(at = packet.timestamp, "second FIN");
                self.second_fin = Some(packet.clone());
                self.state = ClosingState::Fin2;
            }
            _ => {}
        }
    }

    fn on_fin2(&mut self, segment: Segment, packet: &Packet) {
        match segment {
            Segment::Rst => self.abort(packet),
            Segment::Ack => {
                let closes = self
                    .second_fin
                    .as_ref()
                    .is_some_and(|second_fin| validate::acknowledges_fin(second_fin, packet));
                if closes {
                    debug!(at = packet.timestamp, "connection closed gracefully");
                    self.last_ack = Some(packet.clone());
                    self.state = ClosingState::Closed;
                    self.close_reason = Some(CloseReason::Fin);
                }
            }
            _ => {}
        }
    }

    fn abort(&mut self, packet: &Packet) {
        debug!(at = packet.timestamp, "connection reset");
        self.rst = Some(packet.clone());
        self.state = ClosingState::Aborted;
        self.close_reason = Some(CloseReason::Rst);
    }
}

// -- Unit tests --
