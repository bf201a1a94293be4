use clap::ArgAction;

use crate::action::ActionKind;
use crate::connect::ConnectionArgs;
use crate::debug::DebugArgs;
use crate::options::{Options, OptionsBuilder};

/// Query and configure a Phoenix Contact CAPAROC system over Modbus.
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "captool", version, about, args_override_self = true)]
pub struct CliArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    #[command(flatten)]
    pub debug: DebugArgs,

    /// List all registers
    #[arg(short, long)]
    list: bool,
    /// Get info about a specific register (e.g. 0x0010)
    #[arg(short, long, value_name = "ADDRESS")]
    register: Option<String>,
    /// Search for registers by name (case-insensitive substring match)
    #[arg(short, long, value_name = "FILTER")]
    search: Option<String>,
    /// Read UINT16 register (e.g. 0x0010)
    #[arg(long, value_name = "ADDRESS")]
    read_uint16: Option<String>,
    /// Read UINT32 register (e.g. 0x0100)
    #[arg(long, value_name = "ADDRESS")]
    read_uint32: Option<String>,
    /// Read STRING32 register (e.g. 0x1000)
    #[arg(long, value_name = "ADDRESS")]
    read_string32: Option<String>,
    /// Get product name for a specific module (1-16)
    #[arg(long, value_name = "MODULE", num_args = 1.., action = ArgAction::Append)]
    product_name_module: Vec<String>,

    /// Write UINT16 register
    #[arg(long, num_args = 2, value_names = ["ADDRESS", "VALUE"], action = ArgAction::Append)]
    write_uint16: Vec<String>,
    /// Write UINT32 register
    #[arg(long, num_args = 2, value_names = ["ADDRESS", "VALUE"], action = ArgAction::Append)]
    write_uint32: Vec<String>,
    /// Get nominal current
    #[arg(long, num_args = 2, value_names = ["MODULE", "CHANNEL"], action = ArgAction::Append)]
    get_nominal_current: Vec<String>,
    /// Set nominal current, in A
    #[arg(long, num_args = 3, value_names = ["MODULE", "CHANNEL", "VALUE"], action = ArgAction::Append)]
    set_nominal_current: Vec<String>,
    /// Unlock nominal current parametrization
    #[arg(long, num_args = 2, value_names = ["MODULE", "CHANNEL"], action = ArgAction::Append)]
    unlock_nominal_current: Vec<String>,
    /// Read coil status
    #[arg(long, num_args = 1, value_name = "ADDRESS", action = ArgAction::Append)]
    read_coil: Vec<String>,
    /// Write coil (state can be on|off|true|false|1|0)
    #[arg(long, num_args = 2, value_names = ["ADDRESS", "STATE"], action = ArgAction::Append)]
    write_coil: Vec<String>,

    /// Reset application parameters for Power Module and Circuit Breakers
    #[arg(long)]
    reset_application_params_power_and_cb: bool,
    /// Global channel error reset for all Circuit Breakers
    #[arg(long)]
    global_channel_error_reset_all_cb: bool,
    /// Reset error counters for all Circuit Breakers
    #[arg(long)]
    error_counter_reset_all_cb: bool,
    /// Reset application parameters for QUINT Power Supply
    #[arg(long)]
    reset_application_params_quint: bool,
    /// Get product name for Power Module
    #[arg(long)]
    product_name_power_module: bool,
    /// Get product name for QUINT Power Supply
    #[arg(long)]
    product_name_quint: bool,
    /// Get number of currently connected modules
    #[arg(long)]
    num_connected_modules: bool,
    /// Print device information (modules, product names, channels)
    #[arg(long)]
    print_device_info: bool,
    /// Get system-level status (voltage, current, temperature)
    #[arg(long)]
    get_system_status: bool,

    /// Get status for specific channel
    #[arg(long, num_args = 2, value_names = ["MODULE", "CHANNEL"], action = ArgAction::Append)]
    get_channel_status: Vec<String>,
    /// Get actual load current for channel
    #[arg(long, num_args = 2, value_names = ["MODULE", "CHANNEL"], action = ArgAction::Append)]
    get_load_current: Vec<String>,
    /// Control channel on/off
    #[arg(long, num_args = 3, value_names = ["MODULE", "CHANNEL", "STATE"], action = ArgAction::Append)]
    control_channel: Vec<String>,
}

impl CliArgs {
    /// Turn the parsed flags into [Options].
    pub fn decode(&self) -> Options {
        let flags = [
            (self.list, ActionKind::ListRegisters),
            (
                self.reset_application_params_power_and_cb,
                ActionKind::ResetApplicationParamsPowerAndCb,
            ),
            (
                self.global_channel_error_reset_all_cb,
                ActionKind::GlobalChannelErrorResetAllCb,
            ),
            (
                self.error_counter_reset_all_cb,
                ActionKind::ErrorCounterResetAllCb,
            ),
            (
                self.reset_application_params_quint,
                ActionKind::ResetApplicationParamsQuint,
            ),
            (
                self.product_name_power_module,
                ActionKind::ProductNamePowerModule,
            ),
            (self.product_name_quint, ActionKind::ProductNameQuint),
            (self.num_connected_modules, ActionKind::NumConnectedModules),
            (self.print_device_info, ActionKind::PrintDeviceInfo),
            (self.get_system_status, ActionKind::GetSystemStatus),
        ];

        let mut builder = OptionsBuilder::new(self.connection.clone());
        for (present, kind) in flags {
            if present {
                builder = builder.flag(kind);
            }
        }

        if let Some(ref address) = self.register {
            builder = builder.register_info(address);
        }
        if let Some(ref filter) = self.search {
            builder = builder.search(filter);
        }
        if let Some(ref address) = self.read_uint16 {
            builder = builder.read_uint16(address);
        }
        if let Some(ref address) = self.read_uint32 {
            builder = builder.read_uint32(address);
        }
        if let Some(ref address) = self.read_string32 {
            builder = builder.read_string32(address);
        }

        builder
            .write_uint16(&self.write_uint16)
            .write_uint32(&self.write_uint32)
            .product_name_modules(&self.product_name_module)
            .get_nominal_current(&self.get_nominal_current)
            .set_nominal_current(&self.set_nominal_current)
            .unlock_nominal_current(&self.unlock_nominal_current)
            .get_channel_status(&self.get_channel_status)
            .get_load_current(&self.get_load_current)
            .control_channel(&self.control_channel)
            .read_coil(&self.read_coil)
            .write_coil(&self.write_coil)
            .build()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use clap::{CommandFactory, Parser};

    fn decode(args: &[&str]) -> Options {
        CliArgs::parse_from(std::iter::once("captool").chain(args.iter().copied())).decode()
    }

    #[test]
    fn command_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn repeated_writes_share_one_entry() {
        let options = decode(&[
            "--list",
            "--write-uint16",
            "0x10",
            "5",
            "--write-uint16",
            "0x20",
            "6",
        ]);
        assert_eq!(
            options.actions,
            vec![ActionKind::ListRegisters, ActionKind::WriteUint16]
        );
        let pairs: Vec<_> = options
            .write_uint16
            .iter()
            .map(|w| (w.address.as_str(), w.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("0x10", "5"), ("0x20", "6")]);
    }

    #[test]
    fn registration_order_not_typing_order() {
        let options = decode(&["--read-coil", "1", "--get-system-status", "-r", "0x2000"]);
        assert_eq!(
            options.actions,
            vec![
                ActionKind::GetSystemStatus,
                ActionKind::RegisterInfo,
                ActionKind::ReadCoil
            ]
        );
    }

    #[test]
    fn repeated_flags_queue_once() {
        let options = decode(&["-l", "-l", "--get-system-status", "--get-system-status"]);
        assert_eq!(
            options.actions,
            vec![ActionKind::ListRegisters, ActionKind::GetSystemStatus]
        );
    }

    #[test]
    fn repeated_single_values_keep_the_last() {
        let options = decode(&["-r", "0x10", "-r", "0x20"]);
        assert_eq!(options.register_info.as_deref(), Some("0x20"));
        assert_eq!(options.actions, vec![ActionKind::RegisterInfo]);
    }

    #[test]
    fn modules_accept_several_values() {
        let options = decode(&["--product-name-module", "1", "2", "--product-name-module", "5"]);
        assert_eq!(options.product_name_modules, vec!["1", "2", "5"]);
        assert_eq!(options.actions, vec![ActionKind::ProductNameModule]);
    }

    #[test]
    fn incomplete_group_is_a_syntax_error() {
        assert!(CliArgs::try_parse_from(["captool", "--control-channel", "1", "2"]).is_err());
        assert!(CliArgs::try_parse_from(["captool", "--bogus"]).is_err());
    }

    #[test]
    fn connection_flags() {
        let args = CliArgs::parse_from(["captool", "-i", "10.0.0.5", "-p", "1502", "-dd"]);
        assert_eq!(args.connection.ip, "10.0.0.5");
        assert_eq!(args.connection.port, 1502);
        assert_eq!(args.debug.debug, 2);
    }

    #[test]
    fn same_line_same_options() {
        let line = ["--get-load-current", "1", "1", "--write-uint32", "0x100", "7", "-l"];
        assert_eq!(decode(&line), decode(&line));
    }
}
