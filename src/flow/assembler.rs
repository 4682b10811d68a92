use crate::capture::Packet;
use crate::flow::closing::CloseOutcome;
use crate::flow::connection_key::{ConnectionKey, Orientation};
use crate::flow::state::{CloseType, ConnectionState, InvalidReason, InvalidRecord};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A classified connection. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: String,
    pub key: String,
    pub initiator: IpAddr,
    pub initiator_port: u16,
    pub responder: IpAddr,
    pub responder_port: u16,
    pub start_time: u64,
    pub end_time: u64,
    pub state: ConnectionState,
    pub close_type: CloseType,
    pub invalid_reason: Option<InvalidReason>,
    pub establishment: Vec<Packet>,
    pub data_transfer: Vec<Packet>,
    pub closing: Vec<Packet>,
    pub total_packets: usize,
    pub total_bytes: u64,
}

impl Flow {
    pub fn phase_packet_count(&self) -> usize {
        self.establishment.len() + self.data_transfer.len() + self.closing.len()
    }

    /// True if both IPs belong to this flow, in either direction.
    pub fn connects(&self, a: IpAddr, b: IpAddr) -> bool {
        (self.initiator == a && self.responder == b) || (self.initiator == b && self.responder == a)
    }
}

/// Positions in the time-ordered bucket where the phases change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseMarks {
    /// Index of the packet on which the handshake completed.
    pub established_at: Option<usize>,
    /// Index of the first FIN or RST after establishment.
    pub closing_at: Option<usize>,
}

/// Everything the two trackers concluded about one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub invalid: Option<InvalidRecord>,
    pub established: bool,
    pub close: CloseOutcome,
}

impl Verdict {
    /// State, close type and invalid reason, in priority order: an invalid
    /// handshake always wins, then reset, graceful close, half close, open.
    pub fn resolve(&self) -> (ConnectionState, CloseType, Option<InvalidReason>) {
        if let Some(record) = self.invalid {
            return (ConnectionState::Invalid, CloseType::Invalid, Some(record.reason));
        }

        match self.close {
            CloseOutcome::Aborted => (ConnectionState::Reset, CloseType::Abortive, None),
            CloseOutcome::Closed => (ConnectionState::Closed, CloseType::Graceful, None),
            CloseOutcome::HalfClose => (ConnectionState::Unknown, CloseType::HalfClose, None),
            CloseOutcome::Open if self.established => (ConnectionState::Established, CloseType::Open, None),
            CloseOutcome::Open => (ConnectionState::Unknown, CloseType::Open, None),
        }
    }
}

/// Build the output record for one connection from its time-ordered packets.
pub fn assemble(key: &ConnectionKey, packets: Vec<Packet>, verdict: Verdict, marks: PhaseMarks) -> Flow {
    let orientation = Orientation::resolve(key, &packets);
    let (state, close_type, invalid_reason) = verdict.resolve();

    let start_time = packets.iter().map(|p| p.timestamp).min().unwrap_or(0);
    let end_time = packets.iter().map(|p| p.timestamp).max().unwrap_or(0);
    let total_packets = packets.len();
    let total_bytes = packets.iter().map(|p| p.payload_len as u64).sum();

    // Only a completed handshake has data transfer and closing phases
    let marks = if verdict.established && verdict.invalid.is_none() {
        marks
    } else {
        PhaseMarks::default()
    };
    let (establishment, data_transfer, closing) = split_phases(packets, marks);

    Flow {
        id: format!("{}@{}", key, start_time),
        key: key.to_string(),
        initiator: orientation.initiator.ip,
        initiator_port: orientation.initiator.port,
        responder: orientation.responder.ip,
        responder_port: orientation.responder.port,
        start_time,
        end_time,
        state,
        close_type,
        invalid_reason,
        establishment,
        data_transfer,
        closing,
        total_packets,
        total_bytes,
    }
}

/// Cut the bucket into establishment, data transfer and closing. Every
/// packet lands in exactly one phase.
fn split_phases(packets: Vec<Packet>, marks: PhaseMarks) -> (Vec<Packet>, Vec<Packet>, Vec<Packet>) {
    let total = packets.len();
    let establishment_end = marks.established_at.map_or(total, |i| (i + 1).min(total));
    let closing_start = marks.closing_at.unwrap_or(total).clamp(establishment_end, total);

    let mut rest = packets.into_iter();
    let establishment = rest.by_ref().take(establishment_end).collect();
    let data_transfer = rest.by_ref().take(closing_start - establishment_end).collect();
    let closing = rest.collect();
    (establishment, data_transfer, closing)
}
