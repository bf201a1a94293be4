//! Running the action queue against a device.

use std::collections::BTreeMap;
use std::io::Write;

use caplib::{caparoc, registers, Device};

use crate::action::ActionKind;
use crate::group::ChannelRef;
use crate::number::{self, ParseError};
use crate::options::Options;
use crate::report::{self, Outcome, RegisterValue, SystemStatus};

fn parse_channel_ref(args: &ChannelRef) -> Result<(u8, u8), ParseError> {
    Ok((
        number::parse_module(&args.module)?,
        number::parse_channel(&args.channel)?,
    ))
}

/// Walks [Options::actions] in order, writing each report to `out`.
///
/// A bad token only spoils the action or group element it is in, and
/// a device that says no is reported, not raised.
pub struct Dispatcher<'a, D: ?Sized, W> {
    options: &'a Options,
    device: &'a mut D,
    out: W,
    // how many records of each kind have been used up
    cursors: BTreeMap<ActionKind, usize>,
}

impl<'a, D, W> Dispatcher<'a, D, W>
where
    D: Device + ?Sized,
    W: Write,
{
    pub fn new(options: &'a Options, device: &'a mut D, out: W) -> Self {
        Self {
            options,
            device,
            out,
            cursors: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Run every queued action. Only failing to write the report stops this.
    pub fn run(&mut self) -> std::io::Result<()> {
        for kind in self.options.actions.iter() {
            self.dispatch(*kind)?;
        }
        self.out.flush()
    }

    pub fn dispatch(&mut self, kind: ActionKind) -> std::io::Result<()> {
        tracing::debug!(action = %kind, "dispatching");
        let text = self.render(kind);
        self.out.write_all(text.as_bytes())
    }

    /// The records of `kind` not yet used, which are now used.
    fn take<T>(&mut self, kind: ActionKind, records: &'a [T]) -> &'a [T] {
        let cursor = self.cursors.entry(kind).or_insert(0);
        let start = (*cursor).min(records.len());
        *cursor = records.len();
        &records[start..]
    }

    fn last_error(&self) -> &str {
        self.device.last_error().unwrap_or("unknown error")
    }

    fn render(&mut self, kind: ActionKind) -> String {
        use ActionKind::*;
        let options = self.options;
        let dev = &mut *self.device;

        match kind {
            ListRegisters => report::list_registers(&registers::list_all_registers()),

            RegisterInfo => self
                .take(kind, options.register_info.as_slice())
                .iter()
                .map(|token| {
                    let info = number::parse_address(token).map(registers::get_register_info);
                    report::register_info(token, &info)
                })
                .collect(),

            SearchRegisters => self
                .take(kind, options.search.as_slice())
                .iter()
                .map(|filter| report::search(filter, &registers::find_registers(filter)))
                .collect(),

            ReadUint16 | ReadUint32 | ReadString32 => {
                let token = match kind {
                    ReadUint16 => &options.read_uint16,
                    ReadUint32 => &options.read_uint32,
                    _ => &options.read_string32,
                };
                let mut out = String::new();
                for token in self.take(kind, token.as_slice()) {
                    let outcome: Outcome<RegisterValue> =
                        number::parse_address(token).map(|address| {
                            let dev = &mut *self.device;
                            match kind {
                                ReadUint16 => dev.read_u16(address).map(RegisterValue::U16),
                                ReadUint32 => dev.read_u32(address).map(RegisterValue::U32),
                                _ => dev.read_string32(address).map(RegisterValue::String),
                            }
                        });
                    out += &report::read_register(kind, token, &outcome);
                }
                out
            }

            WriteUint16 | WriteUint32 => {
                let groups = match kind {
                    WriteUint16 => &options.write_uint16,
                    _ => &options.write_uint32,
                };
                let groups = self.take(kind, groups);
                if groups.is_empty() {
                    return String::new();
                }

                let mut out = report::header(kind);
                for g in groups {
                    let outcome = number::parse_address(&g.address).and_then(|address| {
                        let dev = &mut *self.device;
                        if kind == WriteUint16 {
                            let value = number::parse_value16(&g.value)?;
                            Ok((address, value as u32, dev.write_u16(address, value)))
                        } else {
                            let value = number::parse_value32(&g.value)?;
                            Ok((address, value, dev.write_u32(address, value)))
                        }
                    });
                    out += &report::register_written(&outcome);
                }
                out
            }

            ResetApplicationParamsPowerAndCb => {
                report::command(kind, caparoc::reset_application_params_power_and_cb(dev))
            }
            GlobalChannelErrorResetAllCb => {
                report::command(kind, caparoc::global_channel_error_reset_all_cb(dev))
            }
            ErrorCounterResetAllCb => {
                report::command(kind, caparoc::error_counter_reset_all_cb(dev))
            }
            ResetApplicationParamsQuint => {
                report::command(kind, caparoc::reset_application_params_quint(dev))
            }

            ProductNamePowerModule => report::product_name(
                kind,
                caparoc::get_product_name_power_module(dev).as_deref(),
            ),
            ProductNameQuint => {
                report::product_name(kind, caparoc::get_product_name_quint(dev).as_deref())
            }
            ProductNameModule => {
                let mut out = String::new();
                for token in self.take(kind, &options.product_name_modules) {
                    let outcome = number::parse_module(token)
                        .map(|m| caparoc::get_product_name_module(&mut *self.device, m));
                    out += &report::product_name_module(token, &outcome);
                }
                out
            }

            NumConnectedModules => {
                report::connected_modules(caparoc::get_num_connected_modules(dev))
            }
            PrintDeviceInfo => report::device_info(&caparoc::print_device_info(dev)),

            GetSystemStatus => report::system_status(&SystemStatus {
                global: caparoc::get_global_status(dev),
                total_current: caparoc::get_total_system_current(dev),
                input_voltage: caparoc::get_input_voltage(dev),
                sum_of_nominal_currents: caparoc::get_sum_of_nominal_currents(dev),
                temperature: caparoc::get_internal_temperature(dev),
            }),

            GetNominalCurrent => {
                let mut out = String::new();
                for args in self.take(kind, &options.get_nominal_current) {
                    let outcome = parse_channel_ref(args).map(|(m, c)| {
                        caparoc::get_nominal_current(&mut *self.device, m, c)
                    });
                    out += &report::nominal_current(args, &outcome);
                }
                out
            }

            SetNominalCurrent => {
                let mut out = String::new();
                for args in self.take(kind, &options.set_nominal_current) {
                    let outcome = (|| -> Result<bool, ParseError> {
                        let module = number::parse_module(&args.module)?;
                        let channel = number::parse_channel(&args.channel)?;
                        let amps = number::parse_current(&args.value)?;
                        Ok(caparoc::set_nominal_current(
                            &mut *self.device,
                            module,
                            channel,
                            amps,
                        ))
                    })();
                    out += &report::nominal_current_set(args, &outcome);
                }
                out
            }

            UnlockNominalCurrent => {
                let mut out = String::new();
                for args in self.take(kind, &options.unlock_nominal_current) {
                    let outcome = parse_channel_ref(args).map(|(m, c)| {
                        caparoc::unlock_nominal_current(&mut *self.device, m, c)
                    });
                    out += &report::unlock(args, &outcome);
                }
                out
            }

            GetChannelStatus => {
                let mut out = String::new();
                for args in self.take(kind, &options.get_channel_status) {
                    let outcome = parse_channel_ref(args).map(|(m, c)| {
                        caparoc::get_channel_status(&mut *self.device, m, c)
                    });
                    out += &report::channel_status(args, &outcome);
                }
                out
            }

            GetLoadCurrent => {
                let mut out = String::new();
                for args in self.take(kind, &options.get_load_current) {
                    let outcome = parse_channel_ref(args).map(|(m, c)| {
                        caparoc::get_load_current(&mut *self.device, m, c)
                    });
                    out += &report::load_current(args, &outcome);
                }
                out
            }

            ControlChannel => {
                let mut out = String::new();
                for args in self.take(kind, &options.control_channel) {
                    let outcome = (|| -> Result<(bool, bool), ParseError> {
                        let module = number::parse_module(&args.module)?;
                        let channel = number::parse_channel(&args.channel)?;
                        let on = number::parse_state(&args.state)?;
                        Ok((
                            on,
                            caparoc::control_channel(&mut *self.device, module, channel, on),
                        ))
                    })();
                    out += &report::channel_control(args, &outcome);
                }
                out
            }

            ReadCoil => {
                let coils = self.take(kind, &options.read_coil);
                if coils.is_empty() {
                    return String::new();
                }

                let mut out = report::header(kind);
                for args in coils {
                    let address = match number::parse_coil_address(&args.address) {
                        Ok(address) => address,
                        Err(e) => {
                            out += &report::error(&e);
                            continue;
                        }
                    };

                    if !self.device.set_slave_id(options.connection.coil_slave_id) {
                        out += &report::slave_id_failed(self.last_error());
                    }
                    let state = self.device.read_coil(address).ok_or(());
                    out += &report::coil_read(address, state.map_err(|()| self.last_error()));
                }
                out
            }

            WriteCoil => {
                let coils = self.take(kind, &options.write_coil);
                if coils.is_empty() {
                    return String::new();
                }

                let mut out = report::header(kind);
                for args in coils {
                    let parsed = number::parse_coil_address(&args.address).and_then(|address| {
                        Ok((address, number::parse_state(&args.state)?))
                    });
                    let (address, state) = match parsed {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            out += &report::error(&e);
                            continue;
                        }
                    };

                    let result = if self.device.write_coil(address, state) {
                        Ok(())
                    } else {
                        Err(self.last_error())
                    };
                    out += &report::coil_written(address, state, result);
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use caplib::simulator::RegisterBank;

    use crate::options::test::builder;

    fn run(options: &Options, bank: &mut RegisterBank) -> String {
        let mut dispatcher = Dispatcher::new(options, bank, Vec::new());
        dispatcher.run().unwrap();
        String::from_utf8(dispatcher.into_inner()).unwrap()
    }

    #[test]
    fn list_then_both_writes_in_one_section() {
        let options = builder()
            .flag(ActionKind::ListRegisters)
            .write_uint16(&["0x10", "5", "0x20", "6"])
            .build();
        let mut bank = RegisterBank::new();
        bank.set_u16(0x10, 0);
        bank.set_u16(0x20, 0);

        let text = run(&options, &mut bank);
        let list = text.find("=== All Registers ===").unwrap();
        let write = text.find("=== Write UINT16 Registers ===").unwrap();
        assert!(list < write);
        assert_eq!(text.matches("=== Write UINT16 Registers ===").count(), 1);
        assert!(text.ends_with("  0x0010 = 5 (SUCCESS)\n  0x0020 = 6 (SUCCESS)\n"));
        assert_eq!(bank.get_u16(0x20), Some(6));
    }

    #[test]
    fn bad_value_only_spoils_its_element() {
        let options = builder().write_uint16(&["0x10", "5", "0x20", "abc"]).build();
        let mut bank = RegisterBank::new();
        bank.set_u16(0x10, 0);
        bank.set_u16(0x20, 0);

        let text = run(&options, &mut bank);
        assert_eq!(
            text,
            "=== Write UINT16 Registers ===\n  0x0010 = 5 (SUCCESS)\n  Error: invalid number 'abc'\n"
        );
        assert_eq!(bank.get_u16(0x10), Some(5));
        assert_eq!(bank.get_u16(0x20), Some(0));
    }

    #[test]
    fn absent_read_does_not_stop_the_queue() {
        let options = builder()
            .flag(ActionKind::NumConnectedModules)
            .read_uint16("0x7777")
            .build();
        let mut bank = RegisterBank::caparoc();

        let text = run(&options, &mut bank);
        assert!(text.contains("Connected modules: 2\n"));
        assert!(text.ends_with("Address: 0x7777\nFailed to read register\n"));
    }

    #[test]
    fn each_record_is_used_once() {
        let options = builder().get_load_current(&["1", "1"]).build();
        let mut bank = RegisterBank::caparoc();
        let mut dispatcher = Dispatcher::new(&options, &mut bank, Vec::new());
        dispatcher.dispatch(ActionKind::GetLoadCurrent).unwrap();
        dispatcher.dispatch(ActionKind::GetLoadCurrent).unwrap();
        let text = String::from_utf8(dispatcher.into_inner()).unwrap();
        assert_eq!(text.matches("=== Load Current").count(), 1);
    }

    #[test]
    fn channel_actions() {
        let options = builder()
            .get_channel_status(&["1", "9", "2", "1"])
            .control_channel(&["1", "1", "off", "1", "2", "maybe"])
            .set_nominal_current(&["1", "1", "10"])
            .unlock_nominal_current(&["1", "1"])
            .build();
        let mut bank = RegisterBank::caparoc();

        let text = run(&options, &mut bank);
        assert!(text.contains(
            "=== Channel Status (Module 1, Channel 9) ===\nError: '9' is out of range (1-4)\n"
        ));
        assert!(text.contains("=== Channel Status (Module 2, Channel 1) ===\n  80% Warning: no\n"));
        assert!(text.contains("=== Control Channel (Module 1, Channel 1 -> OFF) ===\nSUCCESS\n"));
        assert!(text.contains("=== Control Channel (Module 1, Channel 2 -> maybe) ===\nError: "));
        assert!(text.contains("=== Set Nominal Current (Module 1, Channel 1 to 10 A) ===\nSUCCESS\n"));
        assert!(text.contains("=== Unlock Nominal Current (Module 1, Channel 1) ===\nSUCCESS\n"));

        let offset = registers::channel_offset(1, 1).unwrap();
        assert_eq!(bank.get_u16(registers::CHANNEL_CONTROL_BASE + offset), Some(0));
        assert_eq!(bank.get_u16(registers::NOMINAL_CURRENT_BASE + offset), Some(10));
    }

    #[test]
    fn coils() {
        let options = builder()
            .write_coil(&["0x2", "on", "99", "on", "3", "sideways"])
            .read_coil(&["1", "zz"])
            .build();
        let mut bank = RegisterBank::caparoc();
        bank.set_coil(1, true);

        let text = run(&options, &mut bank);
        assert!(text.contains("=== Write Coil ===\nCoil 0x0002 = ON (SUCCESS)\n"));
        assert!(text.contains("Coil 0x0063 = ON (FAILED): "));
        assert!(text.contains("Error: invalid state 'sideways'"));
        assert!(text.contains("=== Read Coil ===\nCoil 0x0001: ON (true)\nError: invalid number 'zz'\n"));
        assert_eq!(bank.slave_id(), 1);
    }

    #[test]
    fn product_names() {
        let options = builder()
            .flag(ActionKind::ProductNamePowerModule)
            .product_name_modules(&["1", "3", "x"])
            .build();
        let mut bank = RegisterBank::caparoc();

        let text = run(&options, &mut bank);
        assert!(text.starts_with("=== Product Name (Power Module) ===\nName: CAPAROC PM EIP\n"));
        assert!(text.contains("=== Product Name (Module 1) ===\nName: "));
        assert!(text.contains(
            "=== Product Name (Module 3) ===\nFailed to read product name (module might not be installed)\n"
        ));
        assert!(text.contains("=== Product Name (Module x) ===\nError: invalid number 'x'\n"));
    }

    #[test]
    fn system_status_reads_everything() {
        let options = builder().flag(ActionKind::GetSystemStatus).build();
        let mut bank = RegisterBank::caparoc();
        let text = run(&options, &mut bank);
        assert!(text.contains("Global Status Bits:\n"));
        assert!(text.contains("Input Voltage: 24.15 V\n"));
        assert!(text.contains("Internal Temperature: 31 °C\n"));
    }
}
