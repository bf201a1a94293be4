use std::io::{Read, Write};

use crate::protocol::Framing;
use crate::Client;

/// Number of registers in a STRING32 value.
pub const STRING32_REGISTERS: u16 = 16;

/// The operations the commander needs from a connected device.
///
/// Reads come back as [None] and writes as `false` when the device
/// could not be asked or did not agree; [Device::last_error] then
/// says why.
pub trait Device {
    /// Read a single UINT16 register.
    fn read_u16(&mut self, address: u16) -> Option<u16>;

    /// Read a UINT32 spread over two registers, high word first.
    fn read_u32(&mut self, address: u16) -> Option<u32>;

    /// Read a STRING32 spread over sixteen registers.
    fn read_string32(&mut self, address: u16) -> Option<String>;

    fn write_u16(&mut self, address: u16, value: u16) -> bool;

    fn write_u32(&mut self, address: u16, value: u32) -> bool;

    fn read_coil(&mut self, address: u16) -> Option<bool>;

    fn write_coil(&mut self, address: u16, state: bool) -> bool;

    /// Select the unit ("slave") id future requests are sent to.
    fn set_slave_id(&mut self, id: u8) -> bool;

    /// Text describing the most recent failure.
    fn last_error(&self) -> Option<&str>;
}

/// Join two registers, high word first.
pub fn join_u32(words: [u16; 2]) -> u32 {
    ((words[0] as u32) << 16) | words[1] as u32
}

/// Split into two registers, high word first.
pub fn split_u32(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, (value & 0xffff) as u16]
}

/// Decode a STRING32 value: two characters per register, high byte
/// first, NUL-terminated or space-padded.
pub fn decode_string32(words: &[u16]) -> String {
    let bytes: Vec<u8> = words
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .take_while(|b| *b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).trim_end().to_owned()
}

/// Encode a string into STRING32 registers, truncating at 32 bytes.
pub fn encode_string32(s: &str) -> [u16; STRING32_REGISTERS as usize] {
    let mut bytes = [0u8; 2 * STRING32_REGISTERS as usize];
    for (dst, src) in bytes.iter_mut().zip(s.bytes()) {
        *dst = src;
    }
    let mut words = [0u16; STRING32_REGISTERS as usize];
    for (w, pair) in words.iter_mut().zip(bytes.chunks(2)) {
        *w = u16::from_be_bytes([pair[0], pair[1]]);
    }
    words
}

impl<F, Fr> Device for Client<F, Fr>
where
    F: Read + Write,
    Fr: Framing,
{
    fn read_u16(&mut self, address: u16) -> Option<u16> {
        self.read_holding_registers(address, 1)
            .ok()
            .and_then(|v| v.first().copied())
    }

    fn read_u32(&mut self, address: u16) -> Option<u32> {
        let words = self.read_holding_registers(address, 2).ok()?;
        Some(join_u32([words[0], words[1]]))
    }

    fn read_string32(&mut self, address: u16) -> Option<String> {
        self.read_holding_registers(address, STRING32_REGISTERS)
            .ok()
            .map(|words| decode_string32(&words))
    }

    fn write_u16(&mut self, address: u16, value: u16) -> bool {
        self.write_single_register(address, value).is_ok()
    }

    fn write_u32(&mut self, address: u16, value: u32) -> bool {
        self.write_multiple_registers(address, &split_u32(value))
            .is_ok()
    }

    fn read_coil(&mut self, address: u16) -> Option<bool> {
        self.read_coils(address, 1)
            .ok()
            .and_then(|v| v.first().copied())
    }

    fn write_coil(&mut self, address: u16, state: bool) -> bool {
        self.write_single_coil(address, state).is_ok()
    }

    fn set_slave_id(&mut self, id: u8) -> bool {
        self.set_unit(id).is_ok()
    }

    fn last_error(&self) -> Option<&str> {
        Client::last_error(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn u32_words(value: u32) -> bool {
        join_u32(split_u32(value)) == value
    }

    #[test]
    fn u32_word_order() {
        assert_eq!(split_u32(0x0001_0002), [0x0001, 0x0002]);
    }

    #[test]
    fn string32_stops_at_nul() {
        let words = encode_string32("CAPAROC PM");
        assert_eq!(words[0], u16::from_be_bytes(*b"CA"));
        assert_eq!(decode_string32(&words), "CAPAROC PM");
    }

    #[test]
    fn string32_trims_padding() {
        let mut words = [u16::from_be_bytes(*b"  "); 16];
        words[0] = u16::from_be_bytes(*b"E2");
        assert_eq!(decode_string32(&words), "E2");
    }

    #[test]
    fn string32_truncates_long_names() {
        let long = "X".repeat(40);
        assert_eq!(decode_string32(&encode_string32(&long)).len(), 32);
    }
}
