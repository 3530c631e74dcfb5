//! Normalized packet representation
//!
//! One row of a capture export, normalized by the CSV parser. Addresses are
//! kept as strings because Wireshark exports mix IP addresses with link-layer
//! addresses (ARP rows) and resolved hostnames.

use serde::{Deserialize, Serialize};

/// Ports commonly abused for lateral movement and remote access
/// (Telnet, MS-RPC, NetBIOS, SMB, RDP, VNC).
pub const SUSPICIOUS_PORTS: &[u16] = &[23, 135, 139, 445, 3389, 5900];

/// Protocol labels considered unremarkable in a capture. Matching is
/// case-sensitive against the label the export carries.
pub const STANDARD_PROTOCOLS: &[&str] =
    &["ARP", "DNS", "ICMP", "HTTP", "HTTPS", "TCP", "TLS", "UDP"];

/// Standard Ethernet MTU; frames above this suggest fragmentation or abuse.
pub const STANDARD_MTU_BYTES: i64 = 1500;

/// A single captured packet, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Capture sequence number ("No." column)
    pub no: u32,
    /// Time offset from capture start, in seconds
    pub time: f64,
    /// Originating address as exported
    pub source_ip: String,
    /// Destination address as exported
    pub dest_ip: String,
    /// Protocol label from the export (e.g. "TCP", "TLSv1.2")
    pub protocol: String,
    /// Frame length in bytes
    pub length: i64,
    /// Destination port extracted from the info column, 0 if absent
    pub port: u16,
    /// Human-readable info column, kept for diagnostics
    pub info: String,
}

impl PacketRecord {
    /// Whether the destination port is on the suspicious list
    pub fn has_suspicious_port(&self) -> bool {
        SUSPICIOUS_PORTS.contains(&self.port)
    }

    /// Whether the frame exceeds the standard Ethernet MTU
    pub fn is_oversized(&self) -> bool {
        self.length > STANDARD_MTU_BYTES
    }

    /// Whether the protocol label is outside the standard set
    pub fn has_unusual_protocol(&self) -> bool {
        !STANDARD_PROTOCOLS.contains(&self.protocol.as_str())
    }
}
