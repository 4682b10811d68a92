use crate::capture::{Endpoint, Packet};
use crate::tcp::tcp_flags::TcpFlags;

/// Packet factory for a single client/server connection.
pub struct Conn {
    pub client: Endpoint,
    pub server: Endpoint,
}

impl Conn {
    pub fn new() -> Self {
        Conn {
            client: Endpoint::v4(10, 1, 1, 20, 53211),
            server: Endpoint::v4(10, 1, 1, 10, 443),
        }
    }

    pub fn with_ports(client_port: u16, server_port: u16) -> Self {
        Conn {
            client: Endpoint::v4(10, 1, 1, 20, client_port),
            server: Endpoint::v4(10, 1, 1, 10, server_port),
        }
    }

    fn to_server(&self, ts: u64, flags: TcpFlags) -> Packet {
        Packet::new(ts, self.client, self.server, flags)
    }

    fn to_client(&self, ts: u64, flags: TcpFlags) -> Packet {
        Packet::new(ts, self.server, self.client, flags)
    }

    pub fn syn(&self, ts: u64, seq: u32) -> Packet {
        self.to_server(ts, TcpFlags::SYN).seq_no(seq)
    }

    pub fn syn_ack(&self, ts: u64, seq: u32, ack: u32) -> Packet {
        self.to_client(ts, TcpFlags::SYN | TcpFlags::ACK).seq_no(seq).ack_no(ack)
    }

    pub fn ack(&self, ts: u64, seq: u32, ack: u32) -> Packet {
        self.to_server(ts, TcpFlags::ACK).seq_no(seq).ack_no(ack)
    }

    pub fn server_ack(&self, ts: u64, seq: u32, ack: u32) -> Packet {
        self.to_client(ts, TcpFlags::ACK).seq_no(seq).ack_no(ack)
    }

    pub fn data_client(&self, ts: u64, seq: u32, ack: u32, len: u32) -> Packet {
        self.to_server(ts, TcpFlags::ACK | TcpFlags::PSH).seq_no(seq).ack_no(ack).payload_len(len)
    }

    pub fn data_server(&self, ts: u64, seq: u32, ack: u32, len: u32) -> Packet {
        self.to_client(ts, TcpFlags::ACK | TcpFlags::PSH).seq_no(seq).ack_no(ack).payload_len(len)
    }

    pub fn fin_client(&self, ts: u64, seq: u32, ack: u32) -> Packet {
        self.to_server(ts, TcpFlags::FIN | TcpFlags::ACK).seq_no(seq).ack_no(ack)
    }

    pub fn fin_server(&self, ts: u64, seq: u32, ack: u32) -> Packet {
        self.to_client(ts, TcpFlags::FIN | TcpFlags::ACK).seq_no(seq).ack_no(ack)
    }

    pub fn rst_client(&self, ts: u64, seq: u32) -> Packet {
        self.to_server(ts, TcpFlags::RST).seq_no(seq)
    }

    pub fn rst_server(&self, ts: u64, seq: u32) -> Packet {
        self.to_client(ts, TcpFlags::RST).seq_no(seq)
    }

    /// SYN, SYN+ACK, ACK at `ts`, `ts + 1`, `ts + 2`.
    pub fn handshake(&self, ts: u64, client_isn: u32, server_isn: u32) -> Vec<Packet> {
        vec![
            self.syn(ts, client_isn),
            self.syn_ack(ts + 1, server_isn, client_isn.wrapping_add(1)),
            self.ack(ts + 2, client_isn.wrapping_add(1), server_isn.wrapping_add(1)),
        ]
    }
}
