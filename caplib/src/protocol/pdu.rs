use super::serialize::{PduSerialize, Serializer};

/// Function codes understood by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadHoldingRegisters = 0x03,
    WriteSingleCoil = 0x05,
    WriteSingleRegister = 0x06,
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    pub const EXCEPTION_FLAG: u8 = 0x80;

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::ReadCoils),
            0x03 => Some(Self::ReadHoldingRegisters),
            0x05 => Some(Self::WriteSingleCoil),
            0x06 => Some(Self::WriteSingleRegister),
            0x10 => Some(Self::WriteMultipleRegisters),
            _ => None,
        }
    }
}

/// Exception codes a device may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    GatewayPathUnavailable,
    GatewayTargetFailed,
    Other(u8),
}

impl ExceptionCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x0a => Self::GatewayPathUnavailable,
            0x0b => Self::GatewayTargetFailed,
            other => Self::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::ServerDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::ServerDeviceBusy => 0x06,
            Self::GatewayPathUnavailable => 0x0a,
            Self::GatewayTargetFailed => 0x0b,
            Self::Other(other) => other,
        }
    }
}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::IllegalFunction => write!(f, "illegal function"),
            Self::IllegalDataAddress => write!(f, "illegal data address"),
            Self::IllegalDataValue => write!(f, "illegal data value"),
            Self::ServerDeviceFailure => write!(f, "server device failure"),
            Self::Acknowledge => write!(f, "acknowledge"),
            Self::ServerDeviceBusy => write!(f, "server device busy"),
            Self::GatewayPathUnavailable => write!(f, "gateway path unavailable"),
            Self::GatewayTargetFailed => write!(f, "gateway target device failed to respond"),
            Self::Other(code) => write!(f, "exception 0x{:02x}", code),
        }
    }
}

/// On-wire value of an ON coil in FC05.
pub const COIL_ON: u16 = 0xff00;
/// On-wire value of an OFF coil in FC05.
pub const COIL_OFF: u16 = 0x0000;

/// A request PDU, client to device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Request {
    ReadCoils { address: u16, count: u16 },
    ReadHoldingRegisters { address: u16, count: u16 },
    WriteSingleCoil { address: u16, state: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

impl Request {
    pub fn function(&self) -> FunctionCode {
        match self {
            Self::ReadCoils { .. } => FunctionCode::ReadCoils,
            Self::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            Self::WriteSingleCoil { .. } => FunctionCode::WriteSingleCoil,
            Self::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }
}

impl PduSerialize for Request {
    fn function_code(&self) -> u8 {
        self.function() as u8
    }

    fn pdu_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::ReadCoils { address, count } | Self::ReadHoldingRegisters { address, count } => {
                ser.write_be_u16(*address)?;
                ser.write_be_u16(*count)
            }
            Self::WriteSingleCoil { address, state } => {
                ser.write_be_u16(*address)?;
                ser.write_be_u16(if *state { COIL_ON } else { COIL_OFF })
            }
            Self::WriteSingleRegister { address, value } => {
                ser.write_be_u16(*address)?;
                ser.write_be_u16(*value)
            }
            Self::WriteMultipleRegisters { address, values } => {
                ser.write_be_u16(*address)?;
                ser.write_be_u16(values.len() as u16)?;
                ser.write_u8((values.len() * 2) as u8)?;
                for v in values {
                    ser.write_be_u16(*v)?;
                }
                Ok(())
            }
        }
    }
}

/// A response PDU, device to client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Response {
    /// Coil states, packed eight to a byte on the wire. This always
    /// holds a multiple of eight states; trailing ones are padding.
    ReadCoils(Vec<bool>),
    ReadHoldingRegisters(Vec<u16>),
    WriteSingleCoil { address: u16, state: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { address: u16, count: u16 },
    Exception { function: u8, code: ExceptionCode },
}

impl Response {
    /// The function code this response answers, without the
    /// exception flag.
    pub fn function(&self) -> u8 {
        match self {
            Self::ReadCoils(_) => FunctionCode::ReadCoils as u8,
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters as u8,
            Self::WriteSingleCoil { .. } => FunctionCode::WriteSingleCoil as u8,
            Self::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister as u8,
            Self::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters as u8,
            Self::Exception { function, .. } => *function,
        }
    }
}

impl PduSerialize for Response {
    fn function_code(&self) -> u8 {
        match self {
            Self::Exception { function, .. } => function | FunctionCode::EXCEPTION_FLAG,
            other => other.function(),
        }
    }

    fn pdu_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::ReadCoils(states) => {
                let bytes: Vec<u8> = states
                    .chunks(8)
                    .map(|chunk| {
                        chunk
                            .iter()
                            .enumerate()
                            .fold(0u8, |acc, (i, on)| acc | ((*on as u8) << i))
                    })
                    .collect();
                ser.write_u8(bytes.len() as u8)?;
                ser.write_bytes(&bytes)
            }
            Self::ReadHoldingRegisters(values) => {
                ser.write_u8((values.len() * 2) as u8)?;
                for v in values {
                    ser.write_be_u16(*v)?;
                }
                Ok(())
            }
            Self::WriteSingleCoil { address, state } => {
                ser.write_be_u16(*address)?;
                ser.write_be_u16(if *state { COIL_ON } else { COIL_OFF })
            }
            Self::WriteSingleRegister { address, value } => {
                ser.write_be_u16(*address)?;
                ser.write_be_u16(*value)
            }
            Self::WriteMultipleRegisters { address, count } => {
                ser.write_be_u16(*address)?;
                ser.write_be_u16(*count)
            }
            Self::Exception { code, .. } => ser.write_u8(code.to_u8()),
        }
    }
}
