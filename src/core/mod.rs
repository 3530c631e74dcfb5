//! Core packet model and capture-export parsing

pub mod packet;
pub mod parser;

pub use packet::{PacketRecord, STANDARD_MTU_BYTES, STANDARD_PROTOCOLS, SUSPICIOUS_PORTS};
pub use parser::{decode_export, CsvParser};
