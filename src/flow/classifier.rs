use crate::capture::Packet;
use crate::flow::assembler::{self, Flow, PhaseMarks, Verdict};
use crate::flow::closing::ClosingTracker;
use crate::flow::config::ClassifierConfig;
use crate::flow::connection_key::{group_by_connection, ConnectionKey};
use crate::flow::handshake::HandshakeTracker;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, trace};

/// Runs both state machines over the packets of a single connection and
/// remembers where the phases change.
#[derive(Debug, Clone)]
pub struct ConnectionClassifier {
    key: ConnectionKey,
    packets: Vec<Packet>,
    handshake: HandshakeTracker,
    closing: ClosingTracker,
    marks: PhaseMarks,
    last_seen: u64,
}

impl ConnectionClassifier {
    pub fn new(key: ConnectionKey, config: ClassifierConfig) -> Self {
        ConnectionClassifier {
            key,
            packets: Vec::new(),
            handshake: HandshakeTracker::new(config),
            closing: ClosingTracker::new(),
            marks: PhaseMarks::default(),
            last_seen: 0,
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Largest timestamp observed so far.
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn observe(&mut self, packet: Packet) {
        let index = self.packets.len();

        if self.handshake.observe(&packet) {
            trace!(key = %self.key, index, "handshake established");
            self.marks.established_at = Some(index);
            self.closing.sync_established();
        }

        if !self.closing.is_terminal() && self.closing.observe(&packet) && self.marks.closing_at.is_none() {
            trace!(key = %self.key, index, reason = ?self.closing.close_reason(), "closing started");
            self.marks.closing_at = Some(index);
        }

        self.last_seen = self.last_seen.max(packet.timestamp);
        self.packets.push(packet);
    }

    /// No more packets for this connection. Timers are evaluated at `capture_end`.
    pub fn finalize(mut self, capture_end: u64) -> Flow {
        self.handshake.finalize(capture_end);

        let verdict = Verdict {
            invalid: self.handshake.invalid(),
            established: self.handshake.is_established(),
            close: self.closing.finalize(),
        };
        let flow = assembler::assemble(&self.key, self.packets, verdict, self.marks);
        trace!(id = %flow.id, state = %flow.state, close_type = %flow.close_type, "flow assembled");
        flow
    }
}

/// Batch classification of a complete capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowClassifier {
    config: ClassifierConfig,
}

impl FlowClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        FlowClassifier { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify every connection in `packets`. The result is sorted by the
    /// textual connection key and does not depend on input order.
    pub fn classify(&self, packets: Vec<Packet>) -> Vec<Flow> {
        let total = packets.len();
        let capture_end = packets.iter().map(|p| p.timestamp).max().unwrap_or(0);
        let buckets = group_by_connection(packets);

        let flows = self.classify_buckets(buckets, capture_end);
        info!(packets = total, flows = flows.len(), "capture classified");
        flows
    }

    /// Buckets are independent, so they are classified in parallel.
    pub fn classify_buckets(&self, buckets: BTreeMap<ConnectionKey, Vec<Packet>>, capture_end: u64) -> Vec<Flow> {
        let buckets: Vec<(ConnectionKey, Vec<Packet>)> = buckets.into_iter().collect();
        let mut flows: Vec<Flow> = buckets
            .into_par_iter()
            .map(|(key, packets)| self.classify_connection(key, packets, capture_end))
            .collect();
        flows.sort_by(|a, b| a.key.cmp(&b.key));
        flows
    }

    /// Classify one time-sorted bucket.
    pub fn classify_connection(&self, key: ConnectionKey, packets: Vec<Packet>, capture_end: u64) -> Flow {
        debug!(key = %key, packets = packets.len(), "classifying connection");
        let mut classifier = ConnectionClassifier::new(key, self.config);
        for packet in packets {
            classifier.observe(packet);
        }
        classifier.finalize(capture_end)
    }
}

/// Classify with the default configuration.
pub fn classify(packets: Vec<Packet>) -> Vec<Flow> {
    FlowClassifier::default().classify(packets)
}

// -- Unit tests --
