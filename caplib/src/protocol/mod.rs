/// Default Modbus TCP port.
pub const TCP_PORT: u16 = 502;

/// Default baud rate for Modbus RTU links.
pub const BAUD_RATE: u32 = 19200;

/// Largest PDU allowed by the Modbus application protocol.
pub const MAX_PDU_SIZE: usize = 253;

/// MBAP header length: transaction, protocol, length, unit.
pub const MBAP_HEADER_LEN: usize = 7;

/// Unit id used for Modbus TCP when the gateway ignores it.
pub const TCP_DEFAULT_UNIT: u8 = 0xff;

/// Most registers one FC03 request may read.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Most coils one FC01 request may read.
pub const MAX_READ_COILS: u16 = 2000;

pub mod crc;

pub mod framing;
pub use framing::{Frame, Framing, Rtu, Tcp};

pub mod parse;
pub use parse::{parse_request, parse_response};

pub mod serialize;
pub use serialize::PduSerialize;

mod pdu;
pub use pdu::*;
