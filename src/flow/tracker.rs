use crate::capture::Packet;
use crate::flow::assembler::Flow;
use crate::flow::classifier::ConnectionClassifier;
use crate::flow::config::ClassifierConfig;
use crate::flow::connection_key::ConnectionKey;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Incremental classifier for captures that arrive packet by packet.
///
/// Packets are expected in timestamp order. Fed a sorted capture and
/// finalized at its last timestamp, it produces exactly what
/// `FlowClassifier::classify` produces for the same packets.
#[derive(Debug)]
pub struct FlowTracker {
    config: ClassifierConfig,
    connections: HashMap<ConnectionKey, ConnectionClassifier>,
    last_timestamp: u64,
    skipped: usize,
}

impl FlowTracker {
    pub fn new(config: ClassifierConfig) -> Self {
        FlowTracker {
            config,
            connections: HashMap::new(),
            last_timestamp: 0,
            skipped: 0,
        }
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// Latest timestamp seen across all connections.
    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    /// Number of packets dropped for lacking ports.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Route a packet to its connection. Returns `false` if the packet was
    /// dropped because it has no ports.
    pub fn ingest(&mut self, packet: Packet) -> bool {
        let Some(key) = ConnectionKey::of(&packet) else {
            self.skipped += 1;
            return false;
        };

        self.last_timestamp = self.last_timestamp.max(packet.timestamp);
        let config = self.config;
        self.connections
            .entry(key)
            .or_insert_with(|| {
                trace!(key = %key, "new connection");
                ConnectionClassifier::new(key, config)
            })
            .observe(packet);
        true
    }

    /// Finalize and remove every connection idle for longer than
    /// `idle_timeout_ms` at `now`. A later packet on the same key starts a
    /// fresh connection.
    pub fn expire_idle(&mut self, now: u64) -> Vec<Flow> {
        let timeout = self.config.idle_timeout_ms;
        let mut idle: Vec<ConnectionKey> = self
            .connections
            .iter()
            .filter(|(_, conn)| now.saturating_sub(conn.last_seen()) > timeout)
            .map(|(key, _)| *key)
            .collect();
        idle.sort();

        let flows: Vec<Flow> = idle
            .into_iter()
            .filter_map(|key| self.connections.remove(&key))
            .map(|conn| conn.finalize(now))
            .collect();

        if !flows.is_empty() {
            debug!(expired = flows.len(), active = self.connections.len(), now, "idle connections finalized");
        }
        flows
    }

    /// End of capture. Every remaining connection is finalized at
    /// `capture_end`, sorted by connection key.
    pub fn finalize(self, capture_end: u64) -> Vec<Flow> {
        let connections: Vec<ConnectionClassifier> = self.connections.into_values().collect();
        let mut flows: Vec<Flow> = connections
            .into_par_iter()
            .map(|conn| conn.finalize(capture_end))
            .collect();
        flows.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(flows = flows.len(), skipped = self.skipped, capture_end, "tracker finalized");
        flows
    }
}

impl Default for FlowTracker {
    fn default() -> Self {
        FlowTracker::new(ClassifierConfig::default())
    }
}

// -- Unit tests --
