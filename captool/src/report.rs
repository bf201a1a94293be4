//! Text for each action's outcome. Nothing here touches the device.
//!
//! Every function returns whole lines, each ending in a newline.

use caplib::caparoc::{ChannelStatus, DeviceInfoError, GlobalStatus, UnlockFailure};
use caplib::registers::Register;

use crate::action::ActionKind;
use crate::group::{ChannelControl, ChannelRef, NominalCurrentSet};
use crate::number::ParseError;

/// A read that parsed its arguments may still come back empty.
pub type Outcome<T> = Result<Option<T>, ParseError>;

/// A value read from a register, as the matching read action shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterValue {
    U16(u16),
    U32(u32),
    String(String),
}

impl std::fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::U16(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Everything the system status section shows. Each part is read on
/// its own and may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemStatus {
    pub global: Option<GlobalStatus>,
    pub total_current: Option<u16>,
    pub input_voltage: Option<u16>,
    pub sum_of_nominal_currents: Option<u16>,
    pub temperature: Option<i16>,
}

pub fn header(kind: ActionKind) -> String {
    format!("=== {} ===\n", kind.title())
}

pub fn header_with(kind: ActionKind, detail: impl std::fmt::Display) -> String {
    format!("=== {} ({}) ===\n", kind.title(), detail)
}

pub fn error(e: &ParseError) -> String {
    format!("Error: {}\n", e)
}

fn success(ok: bool) -> &'static str {
    if ok {
        "SUCCESS"
    } else {
        "FAILED"
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "no"
    }
}

fn on_off(state: bool) -> &'static str {
    if state {
        "ON"
    } else {
        "OFF"
    }
}

fn channel_detail(module: &str, channel: &str) -> String {
    format!("Module {}, Channel {}", module, channel)
}

pub fn list_registers(listing: &str) -> String {
    header(ActionKind::ListRegisters) + listing + "\n"
}

pub fn register_info(token: &str, info: &Result<String, ParseError>) -> String {
    let mut out = header(ActionKind::RegisterInfo);
    out += &format!("Address: {}\n", token);
    match info {
        Ok(text) => out += &format!("{}\n", text),
        Err(e) => out += &format!("Error parsing address: {}\n", e),
    }
    out
}

pub fn search(filter: &str, found: &[&Register]) -> String {
    let mut out = format!(
        "=== {} for '{}' ===\n",
        ActionKind::SearchRegisters.title(),
        filter
    );
    out += &format!("Found {} registers\n", found.len());
    for r in found {
        out += &format!(
            "  [0x{:04X}] {} | {} - {}\n",
            r.address, r.access, r.name, r.description
        );
    }
    out
}

pub fn read_register(kind: ActionKind, token: &str, outcome: &Outcome<RegisterValue>) -> String {
    let mut out = header(kind);
    out += &format!("Address: {}\n", token);
    match outcome {
        Ok(Some(value)) => out += &format!("Value: {}\n", value),
        Ok(None) => out += "Failed to read register\n",
        Err(e) => out += &error(e),
    }
    out
}

/// One line under a write section.
pub fn register_written(outcome: &Result<(u16, u32, bool), ParseError>) -> String {
    match outcome {
        Ok((address, value, ok)) => {
            format!("  0x{:04X} = {} ({})\n", address, value, success(*ok))
        }
        Err(e) => format!("  {}", error(e)),
    }
}

/// Resets and other trigger-only commands.
pub fn command(kind: ActionKind, ok: bool) -> String {
    header(kind) + success(ok) + "\n"
}

/// Product name of the power module or the QUINT supply.
pub fn product_name(kind: ActionKind, name: Option<&str>) -> String {
    let mut out = header(kind);
    match name {
        Some(name) => out += &format!("Name: {}\n", name),
        None => out += "Failed to read product name\n",
    }
    out
}

pub fn product_name_module(token: &str, outcome: &Outcome<String>) -> String {
    let mut out = header_with(ActionKind::ProductNameModule, format!("Module {}", token));
    match outcome {
        Ok(Some(name)) => out += &format!("Name: {}\n", name),
        Ok(None) => out += "Failed to read product name (module might not be installed)\n",
        Err(e) => out += &error(e),
    }
    out
}

pub fn connected_modules(count: Option<u16>) -> String {
    let mut out = header(ActionKind::NumConnectedModules);
    match count {
        Some(n) => out += &format!("Connected modules: {}\n", n),
        None => out += "Failed to read number of connected modules\n",
    }
    out
}

pub fn device_info(info: &Result<String, DeviceInfoError>) -> String {
    let mut out = header(ActionKind::PrintDeviceInfo);
    match info {
        Ok(text) => out += &format!("{}\n", text),
        Err(e) => out += &format!("Error reading device information: {}\n", e),
    }
    out
}

pub fn system_status(status: &SystemStatus) -> String {
    let mut out = header(ActionKind::GetSystemStatus);

    match status.global {
        Some(g) => {
            out += "Global Status Bits:\n";
            for (label, bit) in [
                ("Undervoltage", GlobalStatus::UNDERVOLTAGE),
                ("Overvoltage", GlobalStatus::OVERVOLTAGE),
                ("Cumulative Channel Error", GlobalStatus::CUMULATIVE_CHANNEL_ERROR),
                ("Cumulative 80% Warning", GlobalStatus::CUMULATIVE_80_WARNING),
                ("System Current Too High", GlobalStatus::SYSTEM_CURRENT_TOO_HIGH),
            ] {
                out += &format!("  {}: {}\n", label, yes_no(g.contains(bit)));
            }
        }
        None => out += "Failed to read global status\n",
    }

    if let Some(amps) = status.total_current {
        out += &format!("Total System Current: {} A\n", amps);
    }
    if let Some(centivolts) = status.input_voltage {
        out += &format!("Input Voltage: {:.2} V\n", centivolts as f64 / 100.0);
    }
    if let Some(amps) = status.sum_of_nominal_currents {
        out += &format!("Sum of Nominal Currents: {} A\n", amps);
    }
    if let Some(celsius) = status.temperature {
        out += &format!("Internal Temperature: {} °C\n", celsius);
    }

    out
}

pub fn channel_status(args: &ChannelRef, outcome: &Outcome<ChannelStatus>) -> String {
    let mut out = header_with(
        ActionKind::GetChannelStatus,
        channel_detail(&args.module, &args.channel),
    );
    match outcome {
        Ok(Some(status)) => {
            for (label, bit) in [
                ("80% Warning", ChannelStatus::WARNING_80_PERCENT),
                ("Overload", ChannelStatus::OVERLOAD),
                ("Short Circuit", ChannelStatus::SHORT_CIRCUIT),
                ("Hardware Error", ChannelStatus::HARDWARE_ERROR),
                ("Voltage Error", ChannelStatus::VOLTAGE_ERROR),
                ("Module Current Too High", ChannelStatus::MODULE_CURRENT_TOO_HIGH),
                ("System Current Too High", ChannelStatus::SYSTEM_CURRENT_TOO_HIGH),
            ] {
                out += &format!("  {}: {}\n", label, yes_no(status.contains(bit)));
            }
        }
        Ok(None) => out += "FAILED\n",
        Err(e) => out += &error(e),
    }
    out
}

pub fn load_current(args: &ChannelRef, outcome: &Outcome<u16>) -> String {
    let mut out = header_with(
        ActionKind::GetLoadCurrent,
        channel_detail(&args.module, &args.channel),
    );
    match outcome {
        Ok(Some(ma)) => out += &format!("{:.1} A ({} mA)\n", *ma as f64 / 1000.0, ma),
        Ok(None) => out += "FAILED\n",
        Err(e) => out += &error(e),
    }
    out
}

pub fn nominal_current(args: &ChannelRef, outcome: &Outcome<u16>) -> String {
    let mut out = header_with(
        ActionKind::GetNominalCurrent,
        channel_detail(&args.module, &args.channel),
    );
    match outcome {
        Ok(Some(amps)) => out += &format!("Nominal current: {} A\n", amps),
        Ok(None) => out += "Failed to read nominal current\n",
        Err(e) => out += &error(e),
    }
    out
}

pub fn nominal_current_set(args: &NominalCurrentSet, outcome: &Result<bool, ParseError>) -> String {
    let mut out = header_with(
        ActionKind::SetNominalCurrent,
        format!(
            "{} to {} A",
            channel_detail(&args.module, &args.channel),
            args.value
        ),
    );
    match outcome {
        Ok(ok) => out += &format!("{}\n", success(*ok)),
        Err(e) => out += &error(e),
    }
    out
}

pub fn unlock(
    args: &ChannelRef,
    outcome: &Result<Result<(), UnlockFailure>, ParseError>,
) -> String {
    let mut out = header_with(
        ActionKind::UnlockNominalCurrent,
        channel_detail(&args.module, &args.channel),
    );
    match outcome {
        Ok(Ok(())) => out += "SUCCESS\n",
        Ok(Err(UnlockFailure::GlobalLock)) => out += "FAILED (global lock)\n",
        Ok(Err(UnlockFailure::ChannelLock)) => out += "FAILED (channel lock)\n",
        Err(e) => out += &format!("Error parsing arguments: {}\n", e),
    }
    out
}

/// `outcome` is the requested state and whether the device took it.
pub fn channel_control(args: &ChannelControl, outcome: &Result<(bool, bool), ParseError>) -> String {
    let state = match outcome {
        Ok((on, _)) => on_off(*on),
        Err(_) => args.state.as_str(),
    };
    let mut out = header_with(
        ActionKind::ControlChannel,
        format!("{} -> {}", channel_detail(&args.module, &args.channel), state),
    );
    match outcome {
        Ok((_, ok)) => out += &format!("{}\n", success(*ok)),
        Err(e) => out += &error(e),
    }
    out
}

pub fn slave_id_failed(reason: &str) -> String {
    format!("Failed to set slave ID: {}\n", reason)
}

pub fn coil_read(address: u16, state: Result<bool, &str>) -> String {
    match state {
        Ok(on) => format!("Coil 0x{:04X}: {} ({})\n", address, on_off(on), on),
        Err(reason) => format!("Failed to read coil 0x{:04X}: {}\n", address, reason),
    }
}

pub fn coil_written(address: u16, state: bool, result: Result<(), &str>) -> String {
    match result {
        Ok(()) => format!("Coil 0x{:04X} = {} (SUCCESS)\n", address, on_off(state)),
        Err(reason) => format!(
            "Coil 0x{:04X} = {} (FAILED): {}\n",
            address,
            on_off(state),
            reason
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn channel_ref(module: &str, channel: &str) -> ChannelRef {
        ChannelRef {
            module: module.to_owned(),
            channel: channel.to_owned(),
        }
    }

    #[test]
    fn absent_read_is_failed() {
        let text = read_register(ActionKind::ReadUint16, "0x2000", &Ok(None));
        assert_eq!(
            text,
            "=== Read UINT16 Register ===\nAddress: 0x2000\nFailed to read register\n"
        );
    }

    #[test]
    fn strings_are_quoted() {
        let text = read_register(
            ActionKind::ReadString32,
            "0x1000",
            &Ok(Some(RegisterValue::String("CAPAROC".to_owned()))),
        );
        assert!(text.ends_with("Value: \"CAPAROC\"\n"));
    }

    #[test]
    fn write_lines() {
        assert_eq!(
            register_written(&Ok((0x10, 5, true))),
            "  0x0010 = 5 (SUCCESS)\n"
        );
        assert_eq!(
            register_written(&Err(ParseError::Invalid("abc".to_owned()))),
            "  Error: invalid number 'abc'\n"
        );
    }

    #[test]
    fn load_current_precision() {
        let text = load_current(&channel_ref("1", "2"), &Ok(Some(1340)));
        assert_eq!(
            text,
            "=== Load Current (Module 1, Channel 2) ===\n1.3 A (1340 mA)\n"
        );
    }

    #[test]
    fn system_status_bits_and_voltage() {
        let text = system_status(&SystemStatus {
            global: Some(GlobalStatus::OVERVOLTAGE),
            input_voltage: Some(2415),
            ..Default::default()
        });
        assert!(text.contains("  Undervoltage: no\n"));
        assert!(text.contains("  Overvoltage: YES\n"));
        assert!(text.contains("Input Voltage: 24.15 V\n"));
        assert!(!text.contains("Total System Current"));
    }

    #[test]
    fn missing_global_status() {
        let text = system_status(&SystemStatus::default());
        assert_eq!(text, "=== System Status ===\nFailed to read global status\n");
    }

    #[test]
    fn unlock_steps() {
        let args = channel_ref("2", "3");
        assert!(unlock(&args, &Ok(Err(UnlockFailure::ChannelLock)))
            .ends_with("FAILED (channel lock)\n"));
        assert!(unlock(&args, &Err(ParseError::Invalid("x".to_owned())))
            .ends_with("Error parsing arguments: invalid number 'x'\n"));
    }

    #[test]
    fn channel_control_header_shows_state() {
        let args = ChannelControl {
            module: "1".to_owned(),
            channel: "4".to_owned(),
            state: "on".to_owned(),
        };
        assert_eq!(
            channel_control(&args, &Ok((true, false))),
            "=== Control Channel (Module 1, Channel 4 -> ON) ===\nFAILED\n"
        );
    }

    #[test]
    fn coil_lines() {
        assert_eq!(coil_read(3, Ok(true)), "Coil 0x0003: ON (true)\n");
        assert_eq!(
            coil_written(3, false, Err("timed out")),
            "Coil 0x0003 = OFF (FAILED): timed out\n"
        );
    }
}
