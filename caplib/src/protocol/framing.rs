use std::io::Read;

use nom::bytes::complete::take;
use nom::number::complete::le_u16;
use nom::sequence::pair;

use super::crc::{CrcModbus, CrcStyle};
use super::parse::mbap_header;
use super::serialize::{PduSerialize, Serializer, SerializerCrc, SerializerVec};
use super::{FunctionCode, MAX_PDU_SIZE, MBAP_HEADER_LEN};
use crate::ClientError;

/// One application data unit, with the framing stripped off.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    /// MBAP transaction id, for TCP frames.
    pub transaction: Option<u16>,
    pub unit: u8,
    /// The PDU, function code first.
    pub pdu: Vec<u8>,
}

/// How PDUs are wrapped on a particular transport.
pub trait Framing {
    /// Wrap a PDU into a full frame addressed at `unit`.
    fn encode<P>(&mut self, unit: u8, pdu: &P) -> Vec<u8>
    where
        P: PduSerialize;

    /// Read one complete response frame from the port.
    fn read_response<R>(&mut self, port: &mut R) -> Result<Frame, ClientError>
    where
        R: Read;

    /// Check that a response belongs to the last request sent to `unit`.
    fn check_reply(&self, unit: u8, reply: &Frame) -> Result<(), ClientError>;

    /// Whether `unit` is an addressable unit id on this transport.
    fn accepts_unit(&self, unit: u8) -> bool;
}

/// Read exactly `buf.len()` bytes, turning a short read into
/// [ClientError::UnexpectedEof].
pub fn read_exact<R>(port: &mut R, buf: &mut [u8]) -> Result<(), ClientError>
where
    R: Read,
{
    port.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ClientError::UnexpectedEof,
        _ => ClientError::Io(e),
    })
}

/// Modbus TCP framing: MBAP header, no checksum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tcp {
    transaction: u16,
}

impl Tcp {
    pub fn new() -> Self {
        Self { transaction: 0 }
    }

    /// Transaction id of the last encoded frame.
    pub fn transaction(&self) -> u16 {
        self.transaction
    }

    /// Whether `received` answers a request sent before the current one.
    fn is_stale(&self, received: u16) -> bool {
        let age = self.transaction.wrapping_sub(received);
        age != 0 && age < 0x8000
    }

    /// Build a frame with an explicit transaction id.
    pub fn encode_frame<P>(transaction: u16, unit: u8, pdu: &P) -> Vec<u8>
    where
        P: PduSerialize,
    {
        let mut ser = SerializerVec::new();
        let frame: Result<(), std::convert::Infallible> = (|| {
            ser.write_be_u16(transaction)?;
            // protocol id, always zero
            ser.write_be_u16(0)?;
            ser.write_be_u16(pdu.pdu_len() as u16 + 1)?;
            ser.write_u8(unit)?;
            pdu.pdu(&mut ser)
        })();
        frame.unwrap_or_else(|e| match e {});
        ser.done()
    }

    /// Read one MBAP frame, in either direction.
    pub fn read_frame<R>(port: &mut R) -> Result<Frame, ClientError>
    where
        R: Read,
    {
        let mut raw = [0u8; MBAP_HEADER_LEN];
        read_exact(port, &mut raw)?;
        let (_, header) = mbap_header(&raw)
            .map_err(|_| ClientError::Malformed("short MBAP header".to_owned()))?;

        if header.protocol != 0 {
            return Err(ClientError::Malformed(format!(
                "protocol id {} is not Modbus",
                header.protocol
            )));
        }
        let len = header.pdu_len();
        if len == 0 || len > MAX_PDU_SIZE {
            return Err(ClientError::Malformed(format!(
                "MBAP length {} out of range",
                header.length
            )));
        }

        let mut pdu = vec![0u8; len];
        read_exact(port, &mut pdu)?;
        Ok(Frame {
            transaction: Some(header.transaction),
            unit: header.unit,
            pdu,
        })
    }
}

impl Framing for Tcp {
    fn encode<P>(&mut self, unit: u8, pdu: &P) -> Vec<u8>
    where
        P: PduSerialize,
    {
        self.transaction = self.transaction.wrapping_add(1);
        Self::encode_frame(self.transaction, unit, pdu)
    }

    fn read_response<R>(&mut self, port: &mut R) -> Result<Frame, ClientError>
    where
        R: Read,
    {
        // late answers to requests that already timed out are still
        // queued on the stream ahead of ours
        loop {
            let frame = Self::read_frame(port)?;
            match frame.transaction {
                Some(received) if self.is_stale(received) => {
                    tracing::debug!(
                        sent = self.transaction,
                        received,
                        "dropping late modbus reply"
                    );
                }
                _ => return Ok(frame),
            }
        }
    }

    fn check_reply(&self, _unit: u8, reply: &Frame) -> Result<(), ClientError> {
        // gateways are free to rewrite the unit id, so only the
        // transaction id is checked
        match reply.transaction {
            Some(received) if received == self.transaction => Ok(()),
            received => Err(ClientError::Transaction {
                sent: self.transaction,
                received: received.unwrap_or_default(),
            }),
        }
    }

    fn accepts_unit(&self, _unit: u8) -> bool {
        true
    }
}

/// Highest addressable RTU unit id. Anything above is reserved.
pub const RTU_MAX_UNIT: u8 = 247;

/// Modbus RTU framing: unit id, PDU, CRC-16 low byte first.
#[derive(Debug, Clone, Default)]
pub struct Rtu<C = CrcModbus> {
    crc: C,
}

impl Rtu<CrcModbus> {
    pub fn new() -> Self {
        Self {
            crc: CrcModbus::new(),
        }
    }
}

impl<C> Rtu<C>
where
    C: CrcStyle,
{
    /// How many bytes follow the function code of a response, not
    /// counting the CRC. `head` is the byte after the function code.
    fn response_body_len(function: u8, head: u8) -> Result<usize, ClientError> {
        if function & FunctionCode::EXCEPTION_FLAG != 0 {
            return Ok(1);
        }
        match FunctionCode::from_u8(function) {
            Some(FunctionCode::ReadCoils) | Some(FunctionCode::ReadHoldingRegisters) => {
                Ok(1 + head as usize)
            }
            Some(FunctionCode::WriteSingleCoil)
            | Some(FunctionCode::WriteSingleRegister)
            | Some(FunctionCode::WriteMultipleRegisters) => Ok(4),
            None => Err(ClientError::Malformed(format!(
                "unknown function code 0x{:02x}",
                function
            ))),
        }
    }
}

impl<C> Framing for Rtu<C>
where
    C: CrcStyle,
{
    fn encode<P>(&mut self, unit: u8, pdu: &P) -> Vec<u8>
    where
        P: PduSerialize,
    {
        let mut crc_ser = SerializerCrc::new(&self.crc, SerializerVec::new());
        let body: Result<(), std::convert::Infallible> = (|| {
            crc_ser.write_u8(unit)?;
            pdu.pdu(&mut crc_ser)
        })();
        body.unwrap_or_else(|e| match e {});
        let (crc, mut ser) = crc_ser.finalize();
        ser.write_le_u16(crc).unwrap_or_else(|e| match e {});
        ser.done()
    }

    fn read_response<R>(&mut self, port: &mut R) -> Result<Frame, ClientError>
    where
        R: Read,
    {
        // unit, function, and the first body byte tell us the length
        let mut raw = vec![0u8; 3];
        read_exact(port, &mut raw)?;
        let body_len = Self::response_body_len(raw[1], raw[2])?;

        // body_len counts raw[2] already; add two for the crc
        let start = raw.len();
        raw.resize(start + body_len - 1 + 2, 0);
        read_exact(port, &mut raw[start..])?;

        let checked_len = raw.len() - 2;
        let (_, (checked, provided)) = pair(take(checked_len), le_u16)(&raw[..])
            .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| {
                ClientError::Malformed("short RTU frame".to_owned())
            })?;
        let calculated = self.crc.checksum(checked);
        if !self.crc.validate(calculated, provided) {
            return Err(ClientError::Crc {
                calculated,
                provided,
            });
        }

        Ok(Frame {
            transaction: None,
            unit: raw[0],
            pdu: raw[1..checked_len].to_vec(),
        })
    }

    fn check_reply(&self, unit: u8, reply: &Frame) -> Result<(), ClientError> {
        if reply.unit == unit {
            Ok(())
        } else {
            Err(ClientError::Unit {
                sent: unit,
                received: reply.unit,
            })
        }
    }

    fn accepts_unit(&self, unit: u8) -> bool {
        unit <= RTU_MAX_UNIT
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::{Request, Response};

    #[test]
    fn tcp_frame_layout() {
        let mut tcp = Tcp::new();
        let raw = tcp.encode(
            1,
            &Request::ReadHoldingRegisters {
                address: 0x2000,
                count: 1,
            },
        );
        assert_eq!(
            raw,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x20, 0x00, 0x00, 0x01]
        );
        assert_eq!(tcp.transaction(), 1);
    }

    #[test]
    fn tcp_read_back() {
        let raw = Tcp::encode_frame(9, 3, &Response::ReadHoldingRegisters(vec![7]));
        let frame = Tcp::read_frame(&mut &raw[..]).unwrap();
        assert_eq!(frame.transaction, Some(9));
        assert_eq!(frame.unit, 3);
        assert_eq!(frame.pdu, vec![0x03, 0x02, 0x00, 0x07]);
    }

    #[test]
    fn tcp_transaction_mismatch() {
        let mut tcp = Tcp::new();
        tcp.encode(1, &Request::WriteSingleRegister { address: 0, value: 0 });
        let reply = Frame {
            transaction: Some(5),
            unit: 1,
            pdu: vec![],
        };
        assert!(matches!(
            tcp.check_reply(1, &reply),
            Err(ClientError::Transaction { sent: 1, received: 5 })
        ));
    }

    #[test]
    fn tcp_skips_late_replies() {
        let mut tcp = Tcp::new();
        for _ in 0..3 {
            tcp.encode(1, &Request::WriteSingleRegister { address: 0, value: 0 });
        }
        let mut raw = Tcp::encode_frame(1, 1, &Response::ReadHoldingRegisters(vec![1]));
        raw.extend(Tcp::encode_frame(2, 1, &Response::ReadHoldingRegisters(vec![2])));
        raw.extend(Tcp::encode_frame(3, 1, &Response::ReadHoldingRegisters(vec![3])));

        let frame = tcp.read_response(&mut &raw[..]).unwrap();
        assert_eq!(frame.transaction, Some(3));
        assert!(tcp.check_reply(1, &frame).is_ok());
    }

    #[test]
    fn tcp_stale_ids_wrap() {
        let mut tcp = Tcp::new();
        tcp.encode(1, &Request::WriteSingleRegister { address: 0, value: 0 });
        assert!(tcp.is_stale(0));
        assert!(tcp.is_stale(0xffff));
        assert!(!tcp.is_stale(1));
        assert!(!tcp.is_stale(5));
    }

    #[test]
    fn tcp_truncated_frame_is_eof() {
        let raw = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03];
        assert!(matches!(
            Tcp::read_frame(&mut &raw[..]),
            Err(ClientError::UnexpectedEof)
        ));
    }

    #[test]
    fn rtu_frame_layout() {
        let mut rtu = Rtu::new();
        let raw = rtu.encode(
            1,
            &Request::ReadHoldingRegisters {
                address: 0,
                count: 1,
            },
        );
        assert_eq!(raw, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0a]);
    }

    #[test]
    fn rtu_read_back() {
        let mut rtu = Rtu::new();
        let raw = rtu.encode(4, &Response::ReadHoldingRegisters(vec![0x1234, 0x5678]));
        let frame = rtu.read_response(&mut &raw[..]).unwrap();
        assert_eq!(frame.unit, 4);
        assert_eq!(frame.pdu, vec![0x03, 0x04, 0x12, 0x34, 0x56, 0x78]);
        assert!(rtu.check_reply(4, &frame).is_ok());
        assert!(rtu.check_reply(5, &frame).is_err());
    }

    #[test]
    fn rtu_exception_read_back() {
        let mut rtu = Rtu::new();
        let raw = rtu.encode(
            1,
            &Response::Exception {
                function: 0x06,
                code: crate::protocol::ExceptionCode::IllegalDataValue,
            },
        );
        let frame = rtu.read_response(&mut &raw[..]).unwrap();
        assert_eq!(frame.pdu, vec![0x86, 0x03]);
    }

    #[test]
    fn rtu_bad_crc() {
        let mut rtu = Rtu::new();
        let mut raw = rtu.encode(1, &Response::WriteSingleRegister { address: 1, value: 2 });
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        assert!(matches!(
            rtu.read_response(&mut &raw[..]),
            Err(ClientError::Crc { .. })
        ));
    }

    #[test]
    fn rtu_units() {
        let rtu = Rtu::new();
        assert!(rtu.accepts_unit(0));
        assert!(rtu.accepts_unit(247));
        assert!(!rtu.accepts_unit(248));
    }
}
