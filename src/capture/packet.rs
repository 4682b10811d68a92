use crate::capture::endpoint::Endpoint;
use crate::tcp::tcp_flags::{Segment, TcpFlags};
use crate::tcp::wrap32::Wrap32;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A captured TCP packet record, as delivered by the ingestion layer.
///
/// `timestamp` is in capture-clock milliseconds. Ports are optional because
/// ingestion also hands over non-TCP rows; those never become flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    pub timestamp: u64,
    pub src_ip: IpAddr,
    #[serde(default)]
    pub src_port: Option<u16>,
    pub dst_ip: IpAddr,
    #[serde(default)]
    pub dst_port: Option<u16>,
    #[serde(with = "crate::tcp::tcp_flags::bits")]
    pub flags: TcpFlags,
    #[serde(default)]
    pub seq_no: Wrap32,
    #[serde(default)]
    pub ack_no: Wrap32,
    #[serde(default)]
    pub payload_len: u32,
}

impl Packet {
    /// New packet between two endpoints with zeroed sequence space and no payload.
    pub fn new(timestamp: u64, src: Endpoint, dst: Endpoint, flags: TcpFlags) -> Self {
        Packet {
            timestamp,
            src_ip: src.ip,
            src_port: Some(src.port),
            dst_ip: dst.ip,
            dst_port: Some(dst.port),
            flags,
            seq_no: Wrap32::new(0),
            ack_no: Wrap32::new(0),
            payload_len: 0,
        }
    }

    pub fn seq_no(mut self, seq_no: u32) -> Self {
        self.seq_no = Wrap32::new(seq_no);
        self
    }

    pub fn ack_no(mut self, ack_no: u32) -> Self {
        self.ack_no = Wrap32::new(ack_no);
        self
    }

    pub fn payload_len(mut self, payload_len: u32) -> Self {
        self.payload_len = payload_len;
        self
    }

    pub fn source(&self) -> Option<Endpoint> {
        self.src_port.map(|port| Endpoint::new(self.src_ip, port))
    }

    pub fn destination(&self) -> Option<Endpoint> {
        self.dst_port.map(|port| Endpoint::new(self.dst_ip, port))
    }

    /// Both endpoints, or `None` if either port is missing.
    pub fn endpoints(&self) -> Option<(Endpoint, Endpoint)> {
        Some((self.source()?, self.destination()?))
    }

    pub fn segment(&self) -> Segment {
        self.flags.segment()
    }

    /// True if this packet travels in the opposite direction to `other`.
    pub fn is_reply_to(&self, other: &Packet) -> bool {
        self.src_ip == other.dst_ip
            && self.src_port == other.dst_port
            && self.dst_ip == other.src_ip
            && self.dst_port == other.src_port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Endpoint {
        Endpoint::v4(10, 0, 0, 1, 50000)
    }

    fn server() -> Endpoint {
        Endpoint::v4(10, 0, 0, 2, 80)
    }

    #[test]
    fn test_builder() {
        let packet = Packet::new(5, client(), server(), TcpFlags::ACK)
            .seq_no(100)
            .ack_no(200)
            .payload_len(12);

        assert_eq!(packet.source(), Some(client()));
        assert_eq!(packet.destination(), Some(server()));
        assert_eq!(packet.seq_no, Wrap32::new(100));
        assert_eq!(packet.ack_no, Wrap32::new(200));
        assert_eq!(packet.payload_len, 12);
        assert_eq!(packet.segment(), Segment::Ack);
    }

    #[test]
    fn test_missing_port_has_no_endpoints() {
        let mut packet = Packet::new(0, client(), server(), TcpFlags::SYN);
        packet.dst_port = None;
        assert!(packet.endpoints().is_none());
        assert!(packet.source().is_some());
    }

    #[test]
    fn test_is_reply_to() {
        let syn = Packet::new(0, client(), server(), TcpFlags::SYN);
        let syn_ack = Packet::new(1, server(), client(), TcpFlags::SYN | TcpFlags::ACK);
        assert!(syn_ack.is_reply_to(&syn));
        assert!(!syn.is_reply_to(&syn));
    }

    #[test]
    fn test_deserialize_row() {
        let json = r#"{
            "timestamp": 1700,
            "srcIp": "192.168.1.10",
            "srcPort": 51515,
            "dstIp": "192.168.1.20",
            "dstPort": 443,
            "flags": 2,
            "seqNo": 4294967295
        }"#;
        let packet: Packet = serde_json::from_str(json).unwrap();
        assert_eq!(packet.segment(), Segment::Syn);
        assert_eq!(packet.seq_no, Wrap32::new(u32::MAX));
        assert_eq!(packet.ack_no, Wrap32::new(0));
        assert_eq!(packet.payload_len, 0);
    }

    #[test]
    fn test_deserialize_row_without_ports() {
        let json = r#"{"timestamp": 1, "srcIp": "::1", "dstIp": "::1", "flags": 0}"#;
        let packet: Packet = serde_json::from_str(json).unwrap();
        assert!(packet.endpoints().is_none());
    }
}
