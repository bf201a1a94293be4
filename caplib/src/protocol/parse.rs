use nom::bytes::complete::take;
use nom::combinator::{fail, map, verify};
use nom::multi::count;
use nom::number::complete::{be_u16, be_u8};
use nom::sequence::{pair, tuple};
use nom::IResult;

use super::pdu::{ExceptionCode, FunctionCode, Request, Response, COIL_OFF, COIL_ON};

/// Parsed MBAP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MbapHeader {
    pub transaction: u16,
    pub protocol: u16,
    /// Byte count following the length field, unit id included.
    pub length: u16,
    pub unit: u8,
}

impl MbapHeader {
    /// Number of PDU bytes following this header.
    pub fn pdu_len(&self) -> usize {
        (self.length as usize).saturating_sub(1)
    }
}

pub fn mbap_header(input: &[u8]) -> IResult<&[u8], MbapHeader> {
    map(
        tuple((be_u16, be_u16, be_u16, be_u8)),
        |(transaction, protocol, length, unit)| MbapHeader {
            transaction,
            protocol,
            length,
            unit,
        },
    )(input)
}

fn coil_state(input: &[u8]) -> IResult<&[u8], bool> {
    map(verify(be_u16, |v: &u16| *v == COIL_ON || *v == COIL_OFF), |v| {
        v == COIL_ON
    })(input)
}

fn address_count(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
    pair(be_u16, be_u16)(input)
}

/// Parse a request PDU, function code first.
pub fn parse_request(input: &[u8]) -> IResult<&[u8], Request> {
    let (input, code) = be_u8(input)?;
    match FunctionCode::from_u8(code) {
        Some(FunctionCode::ReadCoils) => map(address_count, |(address, count)| {
            Request::ReadCoils { address, count }
        })(input),
        Some(FunctionCode::ReadHoldingRegisters) => map(address_count, |(address, count)| {
            Request::ReadHoldingRegisters { address, count }
        })(input),
        Some(FunctionCode::WriteSingleCoil) => map(pair(be_u16, coil_state), |(address, state)| {
            Request::WriteSingleCoil { address, state }
        })(input),
        Some(FunctionCode::WriteSingleRegister) => {
            map(pair(be_u16, be_u16), |(address, value)| {
                Request::WriteSingleRegister { address, value }
            })(input)
        }
        Some(FunctionCode::WriteMultipleRegisters) => {
            let (input, (address, quantity)) = address_count(input)?;
            let (input, _) = verify(be_u8, |n: &u8| *n as usize == quantity as usize * 2)(input)?;
            let (input, values) = count(be_u16, quantity as usize)(input)?;
            Ok((input, Request::WriteMultipleRegisters { address, values }))
        }
        // we don't recognize the function code
        None => fail(input),
    }
}

/// Parse a response PDU, function code first.
pub fn parse_response(input: &[u8]) -> IResult<&[u8], Response> {
    let (input, code) = be_u8(input)?;
    if code & FunctionCode::EXCEPTION_FLAG != 0 {
        return map(be_u8, |ex| Response::Exception {
            function: code & !FunctionCode::EXCEPTION_FLAG,
            code: ExceptionCode::from_u8(ex),
        })(input);
    }

    match FunctionCode::from_u8(code) {
        Some(FunctionCode::ReadCoils) => {
            let (input, len) = be_u8(input)?;
            let (input, bytes) = take(len as usize)(input)?;
            let states = bytes
                .iter()
                .flat_map(|b| (0..8).map(move |i| (b >> i) & 1 == 1))
                .collect();
            Ok((input, Response::ReadCoils(states)))
        }
        Some(FunctionCode::ReadHoldingRegisters) => {
            let (input, len) = verify(be_u8, |n: &u8| n % 2 == 0)(input)?;
            map(count(be_u16, len as usize / 2), Response::ReadHoldingRegisters)(input)
        }
        Some(FunctionCode::WriteSingleCoil) => map(pair(be_u16, coil_state), |(address, state)| {
            Response::WriteSingleCoil { address, state }
        })(input),
        Some(FunctionCode::WriteSingleRegister) => {
            map(pair(be_u16, be_u16), |(address, value)| {
                Response::WriteSingleRegister { address, value }
            })(input)
        }
        Some(FunctionCode::WriteMultipleRegisters) => map(address_count, |(address, count)| {
            Response::WriteMultipleRegisters { address, count }
        })(input),
        None => fail(input),
    }
}
