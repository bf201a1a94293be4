use std::convert::Infallible;

use super::crc::{CrcDigest, CrcStyle};

/// A trait for serializing frames. Modbus is big-endian on the wire,
/// except for the RTU checksum.
pub trait Serializer {
    type Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error>;

    // everything else can be written in terms of write_u8

    // Note: these should be specialized in SerializerLength and &mut S,
    // so if you add a method here, add one there.

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        for b in val.iter() {
            self.write_u8(*b)?;
        }
        Ok(())
    }

    fn write_be_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        self.write_bytes(&val.to_be_bytes())
    }

    fn write_le_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        self.write_bytes(&val.to_le_bytes())
    }
}

impl<S> Serializer for &mut S
where
    S: Serializer,
{
    type Error = S::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        (*self).write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        (*self).write_bytes(val)
    }

    fn write_be_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        (*self).write_be_u16(val)
    }

    fn write_le_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        (*self).write_le_u16(val)
    }
}

/// Wrap an std::io::Write to become a Serializer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerWrap<T> {
    inner: T,
}

impl<T> SerializerWrap<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn done(self) -> T {
        self.inner
    }
}

impl<T> Serializer for SerializerWrap<T>
where
    T: std::io::Write,
{
    type Error = std::io::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.inner.write_all(&[val])
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(val)
    }
}

/// A serializer that collects into a Vec.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerVec {
    inner: Vec<u8>,
}

impl SerializerVec {
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    pub fn done(self) -> Vec<u8> {
        self.inner
    }
}

impl Serializer for SerializerVec {
    type Error = Infallible;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.inner.push(val);
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.inner.extend_from_slice(val);
        Ok(())
    }
}

/// A serializer that only counts bytes written.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerLength {
    len: usize,
}

impl SerializerLength {
    pub fn new() -> Self {
        SerializerLength { len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Serializer for SerializerLength {
    type Error = Infallible;

    fn write_u8(&mut self, _val: u8) -> Result<(), Self::Error> {
        self.len += 1;
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.len += val.len();
        Ok(())
    }

    fn write_be_u16(&mut self, _val: u16) -> Result<(), Self::Error> {
        self.len += 2;
        Ok(())
    }

    fn write_le_u16(&mut self, _val: u16) -> Result<(), Self::Error> {
        self.len += 2;
        Ok(())
    }
}

/// A serializer that also computes a CRC on the side.
pub struct SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
{
    digest: C::Digest<'a>,
    inner: T,
}

impl<'a, C, T> SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
{
    pub fn new(crc: &'a C, inner: T) -> Self {
        Self {
            digest: crc.digest(),
            inner,
        }
    }

    pub fn finalize(self) -> (u16, T) {
        (self.digest.finalize(), self.inner)
    }
}

impl<'a, C, T> Serializer for SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
    T: Serializer,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.digest.update(&[val]);
        self.inner.write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.digest.update(val);
        self.inner.write_bytes(val)
    }
}

/// A trait for serializing protocol data units.
pub trait PduSerialize {
    /// The function code byte leading this PDU.
    fn function_code(&self) -> u8;

    /// Serialize everything after the function code.
    ///
    /// This *must* write the same bytes every time it is called with
    /// the same value, as it is run once to measure the length.
    fn pdu_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer;

    /// Serialize the whole PDU, function code first.
    fn pdu<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_u8(self.function_code())?;
        self.pdu_body(ser)
    }

    /// Length of the whole PDU in bytes.
    fn pdu_len(&self) -> usize {
        let mut len_ser = SerializerLength::new();
        self.pdu(&mut len_ser).unwrap_or_else(|e| match e {});
        len_ser.len()
    }
}
