//! CAPAROC-level operations built on a [Device].

use crate::registers;
use crate::Device;

/// Highest module number on one power module.
pub const MAX_MODULES: u8 = 16;

/// Channels on each circuit breaker module.
pub const CHANNELS_PER_MODULE: u8 = 4;

/// Value written to a command register to trigger it.
pub const COMMAND_TRIGGER: u16 = 1;

bitflags::bitflags! {
    /// Global status word.
    #[derive(Default)]
    pub struct GlobalStatus: u16 {
        const UNDERVOLTAGE = 1 << 0;
        const OVERVOLTAGE = 1 << 1;
        const CUMULATIVE_CHANNEL_ERROR = 1 << 2;
        const CUMULATIVE_80_WARNING = 1 << 3;
        const SYSTEM_CURRENT_TOO_HIGH = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Per-channel status word.
    #[derive(Default)]
    pub struct ChannelStatus: u16 {
        const WARNING_80_PERCENT = 1 << 0;
        const OVERLOAD = 1 << 1;
        const SHORT_CIRCUIT = 1 << 2;
        const HARDWARE_ERROR = 1 << 3;
        const VOLTAGE_ERROR = 1 << 4;
        const MODULE_CURRENT_TOO_HIGH = 1 << 5;
        const SYSTEM_CURRENT_TOO_HIGH = 1 << 6;
    }
}

/// Which step of [unlock_nominal_current] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnlockFailure {
    GlobalLock,
    ChannelLock,
}

/// Why [print_device_info] could not describe the device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceInfoError {
    #[error("could not read number of connected modules: {0}")]
    ModuleCount(String),
}

fn trigger<D>(dev: &mut D, address: u16) -> bool
where
    D: Device + ?Sized,
{
    dev.write_u16(address, COMMAND_TRIGGER)
}

pub fn reset_application_params_power_and_cb<D: Device + ?Sized>(dev: &mut D) -> bool {
    trigger(dev, registers::RESET_APPLICATION_PARAMS_POWER_AND_CB)
}

pub fn global_channel_error_reset_all_cb<D: Device + ?Sized>(dev: &mut D) -> bool {
    trigger(dev, registers::GLOBAL_CHANNEL_ERROR_RESET_ALL_CB)
}

pub fn error_counter_reset_all_cb<D: Device + ?Sized>(dev: &mut D) -> bool {
    trigger(dev, registers::ERROR_COUNTER_RESET_ALL_CB)
}

pub fn reset_application_params_quint<D: Device + ?Sized>(dev: &mut D) -> bool {
    trigger(dev, registers::RESET_APPLICATION_PARAMS_QUINT)
}

pub fn get_product_name_power_module<D: Device + ?Sized>(dev: &mut D) -> Option<String> {
    dev.read_string32(registers::PRODUCT_NAME_POWER_MODULE)
}

/// Product name of circuit breaker module `module` (1-16).
///
/// Empty names mean the slot is not populated, and come back as [None].
pub fn get_product_name_module<D: Device + ?Sized>(dev: &mut D, module: u8) -> Option<String> {
    let address = registers::product_name_module(module)?;
    dev.read_string32(address).filter(|name| !name.is_empty())
}

pub fn get_product_name_quint<D: Device + ?Sized>(dev: &mut D) -> Option<String> {
    dev.read_string32(registers::PRODUCT_NAME_QUINT)
}

pub fn get_num_connected_modules<D: Device + ?Sized>(dev: &mut D) -> Option<u16> {
    dev.read_u16(registers::NUM_CONNECTED_MODULES)
}

/// Nominal current of a channel, in A.
pub fn get_nominal_current<D: Device + ?Sized>(dev: &mut D, module: u8, channel: u8) -> Option<u16> {
    let offset = registers::channel_offset(module, channel)?;
    dev.read_u16(registers::NOMINAL_CURRENT_BASE + offset)
}

/// Set the nominal current of a channel, in A.
///
/// The device refuses this unless the channel has been unlocked.
pub fn set_nominal_current<D: Device + ?Sized>(
    dev: &mut D,
    module: u8,
    channel: u8,
    amps: u16,
) -> bool {
    match registers::channel_offset(module, channel) {
        Some(offset) => dev.write_u16(registers::NOMINAL_CURRENT_BASE + offset, amps),
        None => false,
    }
}

/// Clear the global and the per-channel nominal current locks.
pub fn unlock_nominal_current<D: Device + ?Sized>(
    dev: &mut D,
    module: u8,
    channel: u8,
) -> Result<(), UnlockFailure> {
    let offset = registers::channel_offset(module, channel).ok_or(UnlockFailure::ChannelLock)?;
    if !dev.write_u16(registers::NOMINAL_CURRENT_GLOBAL_LOCK, 0) {
        return Err(UnlockFailure::GlobalLock);
    }
    if !dev.write_u16(registers::NOMINAL_CURRENT_CHANNEL_LOCK_BASE + offset, 0) {
        return Err(UnlockFailure::ChannelLock);
    }
    Ok(())
}

pub fn get_global_status<D: Device + ?Sized>(dev: &mut D) -> Option<GlobalStatus> {
    dev.read_u16(registers::GLOBAL_STATUS)
        .map(GlobalStatus::from_bits_truncate)
}

/// Total system current, in A.
pub fn get_total_system_current<D: Device + ?Sized>(dev: &mut D) -> Option<u16> {
    dev.read_u16(registers::TOTAL_SYSTEM_CURRENT)
}

/// Input voltage, in 10 mV steps.
pub fn get_input_voltage<D: Device + ?Sized>(dev: &mut D) -> Option<u16> {
    dev.read_u16(registers::INPUT_VOLTAGE)
}

/// Sum of all channels' nominal currents, in A.
pub fn get_sum_of_nominal_currents<D: Device + ?Sized>(dev: &mut D) -> Option<u16> {
    dev.read_u16(registers::SUM_OF_NOMINAL_CURRENTS)
}

/// Internal temperature, in degrees Celsius.
pub fn get_internal_temperature<D: Device + ?Sized>(dev: &mut D) -> Option<i16> {
    dev.read_u16(registers::INTERNAL_TEMPERATURE)
        .map(|raw| raw as i16)
}

pub fn get_channel_status<D: Device + ?Sized>(
    dev: &mut D,
    module: u8,
    channel: u8,
) -> Option<ChannelStatus> {
    let offset = registers::channel_offset(module, channel)?;
    dev.read_u16(registers::CHANNEL_STATUS_BASE + offset)
        .map(ChannelStatus::from_bits_truncate)
}

/// Actual load current of a channel, in mA.
pub fn get_load_current<D: Device + ?Sized>(dev: &mut D, module: u8, channel: u8) -> Option<u16> {
    let offset = registers::channel_offset(module, channel)?;
    dev.read_u16(registers::LOAD_CURRENT_BASE + offset)
}

/// Switch a channel on or off.
pub fn control_channel<D: Device + ?Sized>(dev: &mut D, module: u8, channel: u8, on: bool) -> bool {
    match registers::channel_offset(module, channel) {
        Some(offset) => dev.write_u16(registers::CHANNEL_CONTROL_BASE + offset, on as u16),
        None => false,
    }
}

/// Summarize the power module and every connected module.
pub fn print_device_info<D: Device + ?Sized>(dev: &mut D) -> Result<String, DeviceInfoError> {
    let count = get_num_connected_modules(dev).ok_or_else(|| {
        DeviceInfoError::ModuleCount(dev.last_error().unwrap_or("no response").to_owned())
    })?;

    let mut out = String::new();
    let name_or = |name: Option<String>| name.unwrap_or_else(|| "(unavailable)".to_owned());

    out += &format!(
        "Power Module: {}\n",
        name_or(get_product_name_power_module(dev))
    );
    out += &format!("Connected modules: {}\n", count);

    let shown = count.min(MAX_MODULES as u16) as u8;
    for module in 1..=shown {
        out += &format!(
            "  Module {}: {}\n",
            module,
            name_or(get_product_name_module(dev, module))
        );
        for channel in 1..=CHANNELS_PER_MODULE {
            let current = get_nominal_current(dev, module, channel)
                .map(|a| format!("{} A", a))
                .unwrap_or_else(|| "?".to_owned());
            out += &format!("    Channel {}: nominal {}\n", channel, current);
        }
    }

    out += &format!("QUINT Power Supply: {}", name_or(get_product_name_quint(dev)));
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::simulator::RegisterBank;

    #[test]
    fn resets_hit_their_command_registers() {
        let mut bank = RegisterBank::caparoc();
        assert!(reset_application_params_quint(&mut bank));
        assert_eq!(
            bank.get_u16(registers::RESET_APPLICATION_PARAMS_QUINT),
            Some(COMMAND_TRIGGER)
        );
    }

    #[test]
    fn channel_status_bits() {
        let mut bank = RegisterBank::caparoc();
        let offset = registers::channel_offset(1, 2).unwrap();
        bank.set_u16(registers::CHANNEL_STATUS_BASE + offset, 0b0000_0110);
        let status = get_channel_status(&mut bank, 1, 2).unwrap();
        assert!(status.contains(ChannelStatus::OVERLOAD));
        assert!(status.contains(ChannelStatus::SHORT_CIRCUIT));
        assert!(!status.contains(ChannelStatus::HARDWARE_ERROR));
    }

    #[test]
    fn out_of_range_channel_is_absent() {
        let mut bank = RegisterBank::caparoc();
        assert_eq!(get_load_current(&mut bank, 1, 5), None);
        assert!(!control_channel(&mut bank, 17, 1, true));
    }

    #[test]
    fn unlock_reports_failing_step() {
        let mut bank = RegisterBank::new();
        assert_eq!(
            unlock_nominal_current(&mut bank, 1, 1),
            Err(UnlockFailure::GlobalLock)
        );
        bank.set_u16(registers::NOMINAL_CURRENT_GLOBAL_LOCK, 1);
        assert_eq!(
            unlock_nominal_current(&mut bank, 1, 1),
            Err(UnlockFailure::ChannelLock)
        );
        bank.set_u16(registers::NOMINAL_CURRENT_CHANNEL_LOCK_BASE, 1);
        assert_eq!(unlock_nominal_current(&mut bank, 1, 1), Ok(()));
        assert_eq!(bank.get_u16(registers::NOMINAL_CURRENT_GLOBAL_LOCK), Some(0));
    }

    #[test]
    fn negative_temperature() {
        let mut bank = RegisterBank::caparoc();
        bank.set_u16(registers::INTERNAL_TEMPERATURE, (-5i16) as u16);
        assert_eq!(get_internal_temperature(&mut bank), Some(-5));
    }

    #[test]
    fn device_info_lists_modules() {
        let mut bank = RegisterBank::caparoc();
        let info = print_device_info(&mut bank).unwrap();
        assert!(info.contains("Connected modules: 2"));
        assert!(info.contains("Module 2:"));
        assert!(!info.contains("Module 3:"));
    }

    #[test]
    fn device_info_needs_module_count() {
        let mut bank = RegisterBank::new();
        assert!(matches!(
            print_device_info(&mut bank),
            Err(DeviceInfoError::ModuleCount(_))
        ));
    }
}
