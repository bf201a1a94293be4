//! Turning command line tokens into addresses and values.

use caplib::caparoc::{CHANNELS_PER_MODULE, MAX_MODULES};

/// A token that could not be used where it was given.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid number '{0}'")]
    Invalid(String),
    #[error("'{token}' is out of range ({min}-{max})")]
    OutOfRange { token: String, min: u32, max: u32 },
    #[error("invalid state '{0}' (expected on, off, true, false, 1 or 0)")]
    InvalidState(String),
}

/// How digits in a token are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Radix {
    /// Hexadecimal, with or without a `0x` prefix.
    Hex,
    /// Hexadecimal with a `0x` prefix, decimal otherwise.
    Auto,
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Width {
    U8,
    U16,
    U32,
}

impl Width {
    pub fn limit(self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U16 => u16::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }
}

fn strip_hex_prefix(token: &str) -> Option<&str> {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
}

/// Parse an unsigned integer that must fit in `width`.
pub fn parse_integer(token: &str, radix: Radix, width: Width) -> Result<u32, ParseError> {
    let (digits, base) = match radix {
        Radix::Hex => (strip_hex_prefix(token).unwrap_or(token), 16),
        Radix::Auto => match strip_hex_prefix(token) {
            Some(digits) => (digits, 16),
            None => (token, 10),
        },
        Radix::Decimal => (token, 10),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(base)) {
        return Err(ParseError::Invalid(token.to_owned()));
    }

    let out_of_range = || ParseError::OutOfRange {
        token: token.to_owned(),
        min: 0,
        max: width.limit(),
    };

    // every digit is valid, so the only failure left is overflow
    let value = u64::from_str_radix(digits, base).map_err(|_| out_of_range())?;
    if value > width.limit() as u64 {
        return Err(out_of_range());
    }
    Ok(value as u32)
}

fn parse_bounded(token: &str, min: u8, max: u8) -> Result<u8, ParseError> {
    let value = parse_integer(token, Radix::Decimal, Width::U8)?;
    if value < min as u32 || value > max as u32 {
        return Err(ParseError::OutOfRange {
            token: token.to_owned(),
            min: min as u32,
            max: max as u32,
        });
    }
    Ok(value as u8)
}

/// A register address: hexadecimal, `0x` optional.
pub fn parse_address(token: &str) -> Result<u16, ParseError> {
    parse_integer(token, Radix::Hex, Width::U16).map(|v| v as u16)
}

pub fn parse_value16(token: &str) -> Result<u16, ParseError> {
    parse_integer(token, Radix::Auto, Width::U16).map(|v| v as u16)
}

pub fn parse_value32(token: &str) -> Result<u32, ParseError> {
    parse_integer(token, Radix::Auto, Width::U32)
}

/// A coil address: `0x` for hexadecimal, decimal otherwise.
pub fn parse_coil_address(token: &str) -> Result<u16, ParseError> {
    parse_integer(token, Radix::Auto, Width::U16).map(|v| v as u16)
}

/// A nominal current, in whole amperes.
pub fn parse_current(token: &str) -> Result<u16, ParseError> {
    parse_integer(token, Radix::Decimal, Width::U16).map(|v| v as u16)
}

pub fn parse_module(token: &str) -> Result<u8, ParseError> {
    parse_bounded(token, 1, MAX_MODULES)
}

pub fn parse_channel(token: &str) -> Result<u8, ParseError> {
    parse_bounded(token, 1, CHANNELS_PER_MODULE)
}

/// An on/off state, ignoring case.
pub fn parse_state(token: &str) -> Result<bool, ParseError> {
    match token.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(ParseError::InvalidState(token.to_owned())),
    }
}
