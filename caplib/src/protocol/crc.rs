/// Generic CRC style, for encoding and decoding RTU frames.
pub trait CrcStyle {
    type Digest<'a>: CrcDigest
    where
        Self: 'a;

    fn digest<'a>(&'a self) -> Self::Digest<'a>;

    fn validate(&self, calculated: u16, provided: u16) -> bool {
        calculated == provided
    }

    /// Compute the checksum of a whole buffer in one go.
    fn checksum(&self, bytes: &[u8]) -> u16 {
        let mut digest = self.digest();
        digest.update(bytes);
        digest.finalize()
    }
}

/// Interface for a CRC digest.
pub trait CrcDigest {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self) -> u16;
}

impl<C> CrcStyle for &C
where
    C: CrcStyle,
{
    type Digest<'a> = C::Digest<'a> where Self: 'a;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        (*self).digest()
    }

    fn validate(&self, calculated: u16, provided: u16) -> bool {
        (*self).validate(calculated, provided)
    }
}

/// The 16-bit Modbus CRC, trailing every RTU frame (low byte first).
#[derive(Clone)]
pub struct CrcModbus(crc::Crc<u16>);

/// A 16-bit Modbus CRC digest struct.
#[derive(Clone)]
pub struct CrcModbusDigest<'a>(crc::Digest<'a, u16, crc::Table<1>>);

impl CrcModbus {
    pub fn new() -> Self {
        Self(crc::Crc::<u16>::new(&crc::CRC_16_MODBUS))
    }
}

impl Default for CrcModbus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CrcModbus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("CrcModbus")
    }
}

impl CrcStyle for CrcModbus {
    type Digest<'a> = CrcModbusDigest<'a>;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        CrcModbusDigest(self.0.digest())
    }
}

impl<'a> CrcDigest for CrcModbusDigest<'a> {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes)
    }

    fn finalize(self) -> u16 {
        self.0.finalize()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modbus_check_value() {
        // catalogue check value for CRC-16/MODBUS
        assert_eq!(CrcModbus::new().checksum(b"123456789"), 0x4b37);
    }

    #[test]
    fn modbus_read_holding_request() {
        // unit 1, FC03, address 0, count 1
        let crc = CrcModbus::new().checksum(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(crc.to_le_bytes(), [0x84, 0x0a]);
    }
}
