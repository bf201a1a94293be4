//! The CAPAROC register map, as far as this library uses it.
//!
//! Per-channel registers are laid out module-major, four channels per
//! module: see [channel_offset].

use std::sync::OnceLock;

use crate::caparoc::{CHANNELS_PER_MODULE, MAX_MODULES};

pub const RESET_APPLICATION_PARAMS_POWER_AND_CB: u16 = 0x0010;
pub const GLOBAL_CHANNEL_ERROR_RESET_ALL_CB: u16 = 0x0011;
pub const ERROR_COUNTER_RESET_ALL_CB: u16 = 0x0012;
pub const RESET_APPLICATION_PARAMS_QUINT: u16 = 0x0013;

pub const OPERATING_HOURS: u16 = 0x0100;
pub const SERIAL_NUMBER: u16 = 0x0102;

pub const PRODUCT_NAME_POWER_MODULE: u16 = 0x1000;
/// Module `n` is at `PRODUCT_NAME_POWER_MODULE + n * 0x10`.
pub const PRODUCT_NAME_STRIDE: u16 = 0x0010;
pub const PRODUCT_NAME_QUINT: u16 =
    PRODUCT_NAME_POWER_MODULE + (MAX_MODULES as u16 + 1) * PRODUCT_NAME_STRIDE;

pub const NUM_CONNECTED_MODULES: u16 = 0x2000;
pub const GLOBAL_STATUS: u16 = 0x2001;
pub const TOTAL_SYSTEM_CURRENT: u16 = 0x2002;
pub const INPUT_VOLTAGE: u16 = 0x2003;
pub const SUM_OF_NOMINAL_CURRENTS: u16 = 0x2004;
pub const INTERNAL_TEMPERATURE: u16 = 0x2005;

pub const CHANNEL_STATUS_BASE: u16 = 0x3000;
pub const LOAD_CURRENT_BASE: u16 = 0x4000;
pub const NOMINAL_CURRENT_BASE: u16 = 0x5000;
pub const CHANNEL_CONTROL_BASE: u16 = 0x6000;

pub const NOMINAL_CURRENT_GLOBAL_LOCK: u16 = 0xc001;
pub const NOMINAL_CURRENT_CHANNEL_LOCK_BASE: u16 = 0xc090;

/// Offset of a channel within a per-channel block, if it exists.
///
/// Modules and channels count from 1.
pub fn channel_offset(module: u8, channel: u8) -> Option<u16> {
    if !(1..=MAX_MODULES).contains(&module) || !(1..=CHANNELS_PER_MODULE).contains(&channel) {
        return None;
    }
    Some((module as u16 - 1) * CHANNELS_PER_MODULE as u16 + (channel as u16 - 1))
}

/// Address of a module's product name, if the module number exists.
pub fn product_name_module(module: u8) -> Option<u16> {
    (1..=MAX_MODULES)
        .contains(&module)
        .then(|| PRODUCT_NAME_POWER_MODULE + module as u16 * PRODUCT_NAME_STRIDE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegisterAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl std::fmt::Display for RegisterAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.pad(match self {
            Self::ReadOnly => "RO",
            Self::WriteOnly => "WO",
            Self::ReadWrite => "RW",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegisterType {
    Uint16,
    Uint32,
    Int16,
    String32,
}

impl RegisterType {
    /// How many 16-bit registers a value of this type covers.
    pub fn words(&self) -> u16 {
        match self {
            Self::Uint16 | Self::Int16 => 1,
            Self::Uint32 => 2,
            Self::String32 => crate::STRING32_REGISTERS,
        }
    }
}

impl std::fmt::Display for RegisterType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.pad(match self {
            Self::Uint16 => "UINT16",
            Self::Uint32 => "UINT32",
            Self::Int16 => "INT16",
            Self::String32 => "STRING32",
        })
    }
}

/// One entry in the register catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Register {
    pub address: u16,
    pub name: String,
    pub kind: RegisterType,
    pub access: RegisterAccess,
    pub description: String,
}

impl Register {
    fn new(
        address: u16,
        name: impl Into<String>,
        kind: RegisterType,
        access: RegisterAccess,
        description: impl Into<String>,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            kind,
            access,
            description: description.into(),
        }
    }
}

fn build_catalog() -> Vec<Register> {
    use RegisterAccess::*;
    use RegisterType::*;

    let mut regs = vec![
        Register::new(
            RESET_APPLICATION_PARAMS_POWER_AND_CB,
            "RESET_APPLICATION_PARAMS_POWER_AND_CB",
            Uint16,
            WriteOnly,
            "Reset application parameters of power module and circuit breakers",
        ),
        Register::new(
            GLOBAL_CHANNEL_ERROR_RESET_ALL_CB,
            "GLOBAL_CHANNEL_ERROR_RESET_ALL_CB",
            Uint16,
            WriteOnly,
            "Reset channel errors on all circuit breakers",
        ),
        Register::new(
            ERROR_COUNTER_RESET_ALL_CB,
            "ERROR_COUNTER_RESET_ALL_CB",
            Uint16,
            WriteOnly,
            "Reset error counters on all circuit breakers",
        ),
        Register::new(
            RESET_APPLICATION_PARAMS_QUINT,
            "RESET_APPLICATION_PARAMS_QUINT",
            Uint16,
            WriteOnly,
            "Reset application parameters of the QUINT power supply",
        ),
        Register::new(
            OPERATING_HOURS,
            "OPERATING_HOURS",
            Uint32,
            ReadOnly,
            "Operating hours of the power module",
        ),
        Register::new(
            SERIAL_NUMBER,
            "SERIAL_NUMBER",
            Uint32,
            ReadOnly,
            "Serial number of the power module",
        ),
        Register::new(
            PRODUCT_NAME_POWER_MODULE,
            "PRODUCT_NAME_POWER_MODULE",
            String32,
            ReadOnly,
            "Product name of the power module",
        ),
    ];

    for module in 1..=MAX_MODULES {
        if let Some(address) = product_name_module(module) {
            regs.push(Register::new(
                address,
                format!("PRODUCT_NAME_MODULE_{}", module),
                String32,
                ReadOnly,
                format!("Product name of circuit breaker module {}", module),
            ));
        }
    }

    regs.extend([
        Register::new(
            PRODUCT_NAME_QUINT,
            "PRODUCT_NAME_QUINT",
            String32,
            ReadOnly,
            "Product name of the QUINT power supply",
        ),
        Register::new(
            NUM_CONNECTED_MODULES,
            "NUM_CONNECTED_MODULES",
            Uint16,
            ReadOnly,
            "Number of currently connected modules",
        ),
        Register::new(
            GLOBAL_STATUS,
            "GLOBAL_STATUS",
            Uint16,
            ReadOnly,
            "Global status bits (undervoltage, overvoltage, cumulative errors)",
        ),
        Register::new(
            TOTAL_SYSTEM_CURRENT,
            "TOTAL_SYSTEM_CURRENT",
            Uint16,
            ReadOnly,
            "Total system current in A",
        ),
        Register::new(
            INPUT_VOLTAGE,
            "INPUT_VOLTAGE",
            Uint16,
            ReadOnly,
            "Input voltage in 10 mV steps",
        ),
        Register::new(
            SUM_OF_NOMINAL_CURRENTS,
            "SUM_OF_NOMINAL_CURRENTS",
            Uint16,
            ReadOnly,
            "Sum of the nominal currents of all channels in A",
        ),
        Register::new(
            INTERNAL_TEMPERATURE,
            "INTERNAL_TEMPERATURE",
            Int16,
            ReadOnly,
            "Internal temperature in degrees Celsius",
        ),
    ]);

    let blocks = [
        (
            CHANNEL_STATUS_BASE,
            "CHANNEL_STATUS",
            ReadOnly,
            "Status bits",
        ),
        (LOAD_CURRENT_BASE, "LOAD_CURRENT", ReadOnly, "Load current in mA"),
        (
            NOMINAL_CURRENT_BASE,
            "NOMINAL_CURRENT",
            ReadWrite,
            "Nominal current in A",
        ),
        (
            CHANNEL_CONTROL_BASE,
            "CHANNEL_CONTROL",
            ReadWrite,
            "Channel switch, 1 on, 0 off",
        ),
        (
            NOMINAL_CURRENT_CHANNEL_LOCK_BASE,
            "NOMINAL_CURRENT_LOCK",
            ReadWrite,
            "Nominal current parametrization lock",
        ),
    ];
    for (base, name, access, description) in blocks {
        for module in 1..=MAX_MODULES {
            for channel in 1..=CHANNELS_PER_MODULE {
                if let Some(offset) = channel_offset(module, channel) {
                    regs.push(Register::new(
                        base + offset,
                        format!("{}_M{}_C{}", name, module, channel),
                        Uint16,
                        access,
                        format!("{} of module {}, channel {}", description, module, channel),
                    ));
                }
            }
        }
    }

    regs.push(Register::new(
        NOMINAL_CURRENT_GLOBAL_LOCK,
        "NOMINAL_CURRENT_GLOBAL_LOCK",
        Uint16,
        ReadWrite,
        "Global nominal current parametrization lock",
    ));

    regs.sort_by_key(|r| r.address);
    regs
}

/// Every known register, sorted by address.
pub fn all() -> &'static [Register] {
    static CATALOG: OnceLock<Vec<Register>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Look up a register by its exact address.
pub fn lookup(address: u16) -> Option<&'static Register> {
    let regs = all();
    regs.binary_search_by_key(&address, |r| r.address)
        .ok()
        .map(|i| &regs[i])
}

/// Registers whose name or description contains `filter`, ignoring case.
pub fn find_registers(filter: &str) -> Vec<&'static Register> {
    let needle = filter.to_lowercase();
    all()
        .iter()
        .filter(|r| {
            r.name.to_lowercase().contains(&needle)
                || r.description.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Describe a single register, multi-line.
pub fn get_register_info(address: u16) -> String {
    match lookup(address) {
        Some(r) => format!(
            "Name: {}\nType: {}\nAccess: {}\nDescription: {}",
            r.name, r.kind, r.access, r.description
        ),
        None => format!("Register 0x{:04X} not found", address),
    }
}

/// One line per register, plus a summary.
pub fn list_all_registers() -> String {
    let mut out = String::new();
    for r in all() {
        out += &format!(
            "0x{:04X} {:<8} {} {} - {}\n",
            r.address, r.kind, r.access, r.name, r.description
        );
    }
    out += &format!("Total registers: {}", all().len());
    out
}
