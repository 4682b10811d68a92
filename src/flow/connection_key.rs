use crate::capture::{Endpoint, Packet};
use crate::tcp::tcp_flags::Segment;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Canonical, direction-free identity of a TCP connection.
///
/// `a` is the first endpoint of whichever `"ip:port-ip:port"` encoding sorts
/// lower, so both directions of a connection produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionKey {
    a: Endpoint,
    b: Endpoint,
}

impl ConnectionKey {
    pub fn new(src: Endpoint, dst: Endpoint) -> Self {
        let forward = format!("{}-{}", src, dst);
        let reverse = format!("{}-{}", dst, src);
        if forward <= reverse {
            ConnectionKey { a: src, b: dst }
        } else {
            ConnectionKey { a: dst, b: src }
        }
    }

    /// Key of a packet, or `None` for packets without ports.
    pub fn of(packet: &Packet) -> Option<Self> {
        let (src, dst) = packet.endpoints()?;
        Some(ConnectionKey::new(src, dst))
    }

    pub fn endpoints(&self) -> (Endpoint, Endpoint) {
        (self.a, self.b)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

/// Who opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    pub initiator: Endpoint,
    pub responder: Endpoint,
}

impl Orientation {
    /// Orientation from the first SYN in a time-sorted bucket. A pure SYN
    /// names its sender; a SYN+ACK names its receiver. Without any SYN the
    /// key's canonical first endpoint is the initiator.
    pub fn resolve(key: &ConnectionKey, packets: &[Packet]) -> Self {
        let from_syn = packets.iter().find_map(|packet| {
            let (src, dst) = packet.endpoints()?;
            match packet.segment() {
                Segment::Syn => Some(Orientation { initiator: src, responder: dst }),
                Segment::SynAck => Some(Orientation { initiator: dst, responder: src }),
                _ => None,
            }
        });

        from_syn.unwrap_or_else(|| {
            let (a, b) = key.endpoints();
            Orientation { initiator: a, responder: b }
        })
    }
}

/// Group packets into per-connection buckets sorted by timestamp.
///
/// The sort is stable so equal timestamps keep capture order. Packets
/// without ports are not TCP flows and are dropped.
pub fn group_by_connection<I>(packets: I) -> BTreeMap<ConnectionKey, Vec<Packet>>
where
    I: IntoIterator<Item = Packet>,
{
    let mut buckets: BTreeMap<ConnectionKey, Vec<Packet>> = BTreeMap::new();
    let mut skipped = 0usize;

    for packet in packets {
        match ConnectionKey::of(&packet) {
            Some(key) => buckets.entry(key).or_default().push(packet),
            None => skipped += 1,
        }
    }

    for bucket in buckets.values_mut() {
        bucket.sort_by_key(|packet| packet.timestamp);
    }

    if skipped > 0 {
        debug!(skipped, "ignored packets without ports");
    }
    debug!(connections = buckets.len(), "grouped packets by connection");

    buckets
}
