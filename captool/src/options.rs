//! The decoded command line: what to connect to and what to do there.

use std::collections::BTreeSet;

use crate::action::ActionKind;
use crate::connect::ConnectionArgs;
use crate::group::{
    decode_groups, ChannelControl, ChannelRef, CoilRead, CoilWrite, NominalCurrentSet,
    RegisterWrite,
};

/// Everything requested on the command line.
///
/// Only [OptionsBuilder::build] makes these, and every kind in
/// [Options::actions] has at least one argument record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub connection: ConnectionArgs,
    pub actions: Vec<ActionKind>,

    pub register_info: Option<String>,
    pub search: Option<String>,
    pub read_uint16: Option<String>,
    pub read_uint32: Option<String>,
    pub read_string32: Option<String>,

    pub write_uint16: Vec<RegisterWrite>,
    pub write_uint32: Vec<RegisterWrite>,
    pub product_name_modules: Vec<String>,
    pub get_nominal_current: Vec<ChannelRef>,
    pub set_nominal_current: Vec<NominalCurrentSet>,
    pub unlock_nominal_current: Vec<ChannelRef>,
    pub get_channel_status: Vec<ChannelRef>,
    pub get_load_current: Vec<ChannelRef>,
    pub control_channel: Vec<ChannelControl>,
    pub read_coil: Vec<CoilRead>,
    pub write_coil: Vec<CoilWrite>,
}

impl Options {
    /// How many argument records `kind` has. Argument-less flags have none.
    pub fn records(&self, kind: ActionKind) -> usize {
        use ActionKind::*;
        match kind {
            RegisterInfo => self.register_info.is_some() as usize,
            SearchRegisters => self.search.is_some() as usize,
            ReadUint16 => self.read_uint16.is_some() as usize,
            ReadUint32 => self.read_uint32.is_some() as usize,
            ReadString32 => self.read_string32.is_some() as usize,
            WriteUint16 => self.write_uint16.len(),
            WriteUint32 => self.write_uint32.len(),
            ProductNameModule => self.product_name_modules.len(),
            GetNominalCurrent => self.get_nominal_current.len(),
            SetNominalCurrent => self.set_nominal_current.len(),
            UnlockNominalCurrent => self.unlock_nominal_current.len(),
            GetChannelStatus => self.get_channel_status.len(),
            GetLoadCurrent => self.get_load_current.len(),
            ControlChannel => self.control_channel.len(),
            ReadCoil => self.read_coil.len(),
            WriteCoil => self.write_coil.len(),
            ListRegisters
            | ResetApplicationParamsPowerAndCb
            | GlobalChannelErrorResetAllCb
            | ErrorCounterResetAllCb
            | ResetApplicationParamsQuint
            | ProductNamePowerModule
            | ProductNameQuint
            | NumConnectedModules
            | PrintDeviceInfo
            | GetSystemStatus => 0,
        }
    }
}

fn dump_scalar(f: &mut std::fmt::Formatter, name: &str, value: &Option<String>) -> std::fmt::Result {
    writeln!(f, "{}: {}", name, value.as_deref().unwrap_or(""))
}

fn dump_list<T>(
    f: &mut std::fmt::Formatter,
    name: &str,
    items: &[T],
    item: impl Fn(&T) -> String,
) -> std::fmt::Result {
    writeln!(f, "{}:", name)?;
    if items.is_empty() {
        return writeln!(f, "  (none)");
    }
    for i in items {
        writeln!(f, "  - {}", item(i))?;
    }
    Ok(())
}

fn channel(args: &ChannelRef) -> String {
    format!("module: {}, channel: {}", args.module, args.channel)
}

fn write(args: &RegisterWrite) -> String {
    format!("address: {}, value: {}", args.address, args.value)
}

impl std::fmt::Display for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let c = &self.connection;
        match c.serial {
            Some(ref path) => {
                writeln!(f, "serial_port: {}", path)?;
                writeln!(f, "baud_rate: {}", c.baud)?;
            }
            None => {
                writeln!(f, "ip_address: {}", c.ip)?;
                writeln!(f, "port: {}", c.port)?;
            }
        }
        writeln!(f, "timeout_seconds: {}", c.timeout)?;
        match c.unit_id {
            Some(id) => writeln!(f, "unit_id: {}", id)?,
            None => writeln!(f, "unit_id: (default)")?,
        }
        writeln!(f, "coil_slave_id: {}", c.coil_slave_id)?;

        dump_list(f, "actions", &self.actions, |a| a.name().to_owned())?;

        dump_scalar(f, "register_info_address", &self.register_info)?;
        dump_scalar(f, "search_filter", &self.search)?;
        dump_scalar(f, "read_uint16_address", &self.read_uint16)?;
        dump_scalar(f, "read_uint32_address", &self.read_uint32)?;
        dump_scalar(f, "read_string32_address", &self.read_string32)?;

        dump_list(f, "write_uint16_args", &self.write_uint16, write)?;
        dump_list(f, "write_uint32_args", &self.write_uint32, write)?;
        dump_list(f, "product_module_numbers", &self.product_name_modules, |m| {
            m.clone()
        })?;
        dump_list(f, "get_nominal_current_args", &self.get_nominal_current, channel)?;
        dump_list(f, "set_nominal_current_args", &self.set_nominal_current, |a| {
            format!(
                "module: {}, channel: {}, value: {}",
                a.module, a.channel, a.value
            )
        })?;
        dump_list(f, "unlock_nominal_current_args", &self.unlock_nominal_current, channel)?;
        dump_list(f, "get_channel_status_args", &self.get_channel_status, channel)?;
        dump_list(f, "get_load_current_args", &self.get_load_current, channel)?;
        dump_list(f, "control_channel_args", &self.control_channel, |a| {
            format!(
                "module: {}, channel: {}, state: {}",
                a.module, a.channel, a.state
            )
        })?;
        dump_list(f, "read_coil_args", &self.read_coil, |a| {
            format!("address: {}", a.address)
        })?;
        dump_list(f, "write_coil_args", &self.write_coil, |a| {
            format!("address: {}, state: {}", a.address, a.state)
        })
    }
}

/// Collects flags and arguments, in any order, into [Options].
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    flags: BTreeSet<ActionKind>,
    options: Options,
}

impl OptionsBuilder {
    pub fn new(connection: ConnectionArgs) -> Self {
        Self {
            flags: BTreeSet::new(),
            options: Options {
                connection,
                actions: Vec::new(),
                register_info: None,
                search: None,
                read_uint16: None,
                read_uint32: None,
                read_string32: None,
                write_uint16: Vec::new(),
                write_uint32: Vec::new(),
                product_name_modules: Vec::new(),
                get_nominal_current: Vec::new(),
                set_nominal_current: Vec::new(),
                unlock_nominal_current: Vec::new(),
                get_channel_status: Vec::new(),
                get_load_current: Vec::new(),
                control_channel: Vec::new(),
                read_coil: Vec::new(),
                write_coil: Vec::new(),
            },
        }
    }

    /// Request an argument-less action. Other kinds are ignored here,
    /// they are requested by giving their arguments.
    pub fn flag(mut self, kind: ActionKind) -> Self {
        if ActionKind::FLAGS.contains(&kind) {
            self.flags.insert(kind);
        }
        self
    }

    pub fn register_info(mut self, address: impl Into<String>) -> Self {
        self.options.register_info = Some(address.into());
        self
    }

    pub fn search(mut self, filter: impl Into<String>) -> Self {
        self.options.search = Some(filter.into());
        self
    }

    pub fn read_uint16(mut self, address: impl Into<String>) -> Self {
        self.options.read_uint16 = Some(address.into());
        self
    }

    pub fn read_uint32(mut self, address: impl Into<String>) -> Self {
        self.options.read_uint32 = Some(address.into());
        self
    }

    pub fn read_string32(mut self, address: impl Into<String>) -> Self {
        self.options.read_string32 = Some(address.into());
        self
    }

    pub fn product_name_modules<S: AsRef<str>>(mut self, modules: &[S]) -> Self {
        self.options
            .product_name_modules
            .extend(modules.iter().map(|m| m.as_ref().to_owned()));
        self
    }

    pub fn write_uint16<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.write_uint16.extend(decode_groups(flat));
        self
    }

    pub fn write_uint32<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.write_uint32.extend(decode_groups(flat));
        self
    }

    pub fn get_nominal_current<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.get_nominal_current.extend(decode_groups(flat));
        self
    }

    pub fn set_nominal_current<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.set_nominal_current.extend(decode_groups(flat));
        self
    }

    pub fn unlock_nominal_current<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options
            .unlock_nominal_current
            .extend(decode_groups(flat));
        self
    }

    pub fn get_channel_status<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.get_channel_status.extend(decode_groups(flat));
        self
    }

    pub fn get_load_current<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.get_load_current.extend(decode_groups(flat));
        self
    }

    pub fn control_channel<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.control_channel.extend(decode_groups(flat));
        self
    }

    pub fn read_coil<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.read_coil.extend(decode_groups(flat));
        self
    }

    pub fn write_coil<S: AsRef<str>>(mut self, flat: &[S]) -> Self {
        self.options.write_coil.extend(decode_groups(flat));
        self
    }

    /// Seal the options and lay out the action queue: flags first,
    /// then actions with arguments, each in registration order.
    pub fn build(self) -> Options {
        let Self { flags, mut options } = self;

        options.actions = ActionKind::FLAGS
            .iter()
            .filter(|k| flags.contains(*k))
            .chain(
                ActionKind::WITH_ARGUMENTS
                    .iter()
                    .filter(|k| options.records(**k) > 0),
            )
            .copied()
            .collect();

        options
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Wrapper {
        #[command(flatten)]
        connection: ConnectionArgs,
    }

    /// Connection settings as if nothing was given.
    pub(crate) fn connection() -> ConnectionArgs {
        Wrapper::parse_from(["test"]).connection
    }

    pub(crate) fn builder() -> OptionsBuilder {
        OptionsBuilder::new(connection())
    }

    #[test]
    fn list_and_two_writes() {
        let options = builder()
            .flag(ActionKind::ListRegisters)
            .write_uint16(&["0x10", "5", "0x20", "6"])
            .build();

        assert_eq!(
            options.actions,
            vec![ActionKind::ListRegisters, ActionKind::WriteUint16]
        );
        assert_eq!(options.write_uint16.len(), 2);
        assert_eq!(options.write_uint16[0].address, "0x10");
        assert_eq!(options.write_uint16[1].value, "6");
    }

    #[test]
    fn flags_come_before_arguments() {
        let options = builder()
            .read_coil(&["0"])
            .flag(ActionKind::GetSystemStatus)
            .register_info("0x2000")
            .flag(ActionKind::ListRegisters)
            .build();

        assert_eq!(
            options.actions,
            vec![
                ActionKind::ListRegisters,
                ActionKind::GetSystemStatus,
                ActionKind::RegisterInfo,
                ActionKind::ReadCoil,
            ]
        );
    }

    #[test]
    fn partial_groups_queue_nothing() {
        let options = builder().set_nominal_current(&["1", "2"]).build();
        assert!(options.actions.is_empty());
        assert!(options.set_nominal_current.is_empty());
    }

    #[test]
    fn queue_kinds_have_records() {
        let options = builder()
            .flag(ActionKind::PrintDeviceInfo)
            .flag(ActionKind::WriteCoil)
            .control_channel(&["1", "1", "on"])
            .build();
        // WriteCoil has no arguments, so asking for it as a flag does nothing
        assert_eq!(
            options.actions,
            vec![ActionKind::PrintDeviceInfo, ActionKind::ControlChannel]
        );
        for kind in options.actions.iter() {
            assert!(ActionKind::FLAGS.contains(kind) || options.records(*kind) > 0);
        }
    }

    #[test]
    fn decoding_is_deterministic() {
        let make = || {
            builder()
                .flag(ActionKind::NumConnectedModules)
                .write_uint32(&["0x100", "70000"])
                .get_load_current(&["1", "1", "2", "4"])
                .build()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn dump_lists_everything() {
        let dump = builder()
            .flag(ActionKind::ListRegisters)
            .write_uint16(&["0x10", "5"])
            .build()
            .to_string();

        assert!(dump.contains("ip_address: 192.168.1.2\n"));
        assert!(dump.contains("actions:\n  - LIST_REGISTERS\n  - WRITE_UINT16\n"));
        assert!(dump.contains("write_uint16_args:\n  - address: 0x10, value: 5\n"));
        assert!(dump.contains("write_uint32_args:\n  (none)\n"));
    }
}
