//! An in-memory CAPAROC stand-in, for tests and demos.
//!
//! [RegisterBank] is a [Device] by itself, and [Simulator] serves one
//! over Modbus TCP.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use crate::device::{encode_string32, join_u32, split_u32, STRING32_REGISTERS};
use crate::protocol::{
    parse_request, ExceptionCode, Request, Response, Tcp, MAX_READ_COILS, MAX_READ_REGISTERS,
};
use crate::{registers, ClientError, Device};

/// Mapped registers and coils. Anything not mapped answers with
/// [ExceptionCode::IllegalDataAddress].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterBank {
    registers: BTreeMap<u16, u16>,
    coils: BTreeMap<u16, bool>,
    unit: u8,
    last_error: Option<String>,
}

impl RegisterBank {
    /// An empty bank, with nothing mapped.
    pub fn new() -> Self {
        Self::default()
    }

    /// A power module with two four-channel breakers and eight coils.
    pub fn caparoc() -> Self {
        let mut bank = Self::new();

        for address in [
            registers::RESET_APPLICATION_PARAMS_POWER_AND_CB,
            registers::GLOBAL_CHANNEL_ERROR_RESET_ALL_CB,
            registers::ERROR_COUNTER_RESET_ALL_CB,
            registers::RESET_APPLICATION_PARAMS_QUINT,
            registers::NOMINAL_CURRENT_GLOBAL_LOCK,
        ] {
            bank.set_u16(address, 0);
        }
        bank.set_u32(registers::OPERATING_HOURS, 1234);
        bank.set_u32(registers::SERIAL_NUMBER, 0x0012_d687);

        bank.set_string32(registers::PRODUCT_NAME_POWER_MODULE, "CAPAROC PM EIP");
        for module in 1..=crate::caparoc::MAX_MODULES {
            if let Some(address) = registers::product_name_module(module) {
                let name = if module <= 2 { "CAPAROC E4 12-24DC/1-10A" } else { "" };
                bank.set_string32(address, name);
            }
        }
        bank.set_string32(registers::PRODUCT_NAME_QUINT, "QUINT4-PS/1AC/24DC/20");

        bank.set_u16(registers::NUM_CONNECTED_MODULES, 2);
        bank.set_u16(registers::GLOBAL_STATUS, 0);
        bank.set_u16(registers::TOTAL_SYSTEM_CURRENT, 7);
        bank.set_u16(registers::INPUT_VOLTAGE, 2415);
        bank.set_u16(registers::SUM_OF_NOMINAL_CURRENTS, 48);
        bank.set_u16(registers::INTERNAL_TEMPERATURE, 31);

        for module in 1..=2 {
            for channel in 1..=crate::caparoc::CHANNELS_PER_MODULE {
                if let Some(offset) = registers::channel_offset(module, channel) {
                    bank.set_u16(registers::CHANNEL_STATUS_BASE + offset, 0);
                    bank.set_u16(registers::LOAD_CURRENT_BASE + offset, 1250);
                    bank.set_u16(registers::NOMINAL_CURRENT_BASE + offset, 6);
                    bank.set_u16(registers::CHANNEL_CONTROL_BASE + offset, 1);
                    bank.set_u16(registers::NOMINAL_CURRENT_CHANNEL_LOCK_BASE + offset, 1);
                }
            }
        }

        for address in 0..8 {
            bank.set_coil(address, false);
        }

        bank
    }

    pub fn set_u16(&mut self, address: u16, value: u16) {
        self.registers.insert(address, value);
    }

    pub fn get_u16(&self, address: u16) -> Option<u16> {
        self.registers.get(&address).copied()
    }

    pub fn set_u32(&mut self, address: u16, value: u32) {
        for (i, w) in split_u32(value).into_iter().enumerate() {
            self.set_u16(address + i as u16, w);
        }
    }

    pub fn set_string32(&mut self, address: u16, value: &str) {
        for (i, w) in encode_string32(value).into_iter().enumerate() {
            self.set_u16(address + i as u16, w);
        }
    }

    pub fn set_coil(&mut self, address: u16, state: bool) {
        self.coils.insert(address, state);
    }

    pub fn get_coil(&self, address: u16) -> Option<bool> {
        self.coils.get(&address).copied()
    }

    /// The slave id last selected through [Device::set_slave_id].
    pub fn slave_id(&self) -> u8 {
        self.unit
    }

    fn read_block(&self, address: u16, count: u16) -> Result<Vec<u16>, ExceptionCode> {
        (0..count)
            .map(|i| {
                address
                    .checked_add(i)
                    .and_then(|a| self.get_u16(a))
                    .ok_or(ExceptionCode::IllegalDataAddress)
            })
            .collect()
    }

    fn write_block(&mut self, address: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        // all or nothing
        self.read_block(address, values.len() as u16)?;
        for (i, v) in values.iter().enumerate() {
            self.set_u16(address + i as u16, *v);
        }
        Ok(())
    }

    /// Answer one request the way a device would.
    pub fn handle(&mut self, request: &Request) -> Response {
        let function = request.function() as u8;
        let result = match request {
            Request::ReadCoils { address, count } => {
                if *count == 0 || *count > MAX_READ_COILS {
                    Err(ExceptionCode::IllegalDataValue)
                } else {
                    (0..*count)
                        .map(|i| {
                            address
                                .checked_add(i)
                                .and_then(|a| self.get_coil(a))
                                .ok_or(ExceptionCode::IllegalDataAddress)
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map(Response::ReadCoils)
                }
            }
            Request::ReadHoldingRegisters { address, count } => {
                if *count == 0 || *count > MAX_READ_REGISTERS {
                    Err(ExceptionCode::IllegalDataValue)
                } else {
                    self.read_block(*address, *count)
                        .map(Response::ReadHoldingRegisters)
                }
            }
            Request::WriteSingleCoil { address, state } => match self.get_coil(*address) {
                Some(_) => {
                    self.set_coil(*address, *state);
                    Ok(Response::WriteSingleCoil {
                        address: *address,
                        state: *state,
                    })
                }
                None => Err(ExceptionCode::IllegalDataAddress),
            },
            Request::WriteSingleRegister { address, value } => self
                .write_block(*address, &[*value])
                .map(|()| Response::WriteSingleRegister {
                    address: *address,
                    value: *value,
                }),
            Request::WriteMultipleRegisters { address, values } => self
                .write_block(*address, values)
                .map(|()| Response::WriteMultipleRegisters {
                    address: *address,
                    count: values.len() as u16,
                }),
        };

        result.unwrap_or_else(|code| {
            tracing::debug!(?request, %code, "simulated device refused request");
            Response::Exception { function, code }
        })
    }

    fn fail(&mut self, what: &str, address: u16) {
        self.last_error = Some(format!("{} 0x{:04X}: illegal data address", what, address));
    }
}

impl Device for RegisterBank {
    fn read_u16(&mut self, address: u16) -> Option<u16> {
        self.read_words(address, 1).map(|w| w[0])
    }

    fn read_u32(&mut self, address: u16) -> Option<u32> {
        self.read_words(address, 2)
            .map(|w| join_u32([w[0], w[1]]))
    }

    fn read_string32(&mut self, address: u16) -> Option<String> {
        self.read_words(address, STRING32_REGISTERS)
            .map(|w| crate::device::decode_string32(&w))
    }

    fn write_u16(&mut self, address: u16, value: u16) -> bool {
        let ok = self.write_block(address, &[value]).is_ok();
        if !ok {
            self.fail("write", address);
        }
        ok
    }

    fn write_u32(&mut self, address: u16, value: u32) -> bool {
        let ok = self.write_block(address, &split_u32(value)).is_ok();
        if !ok {
            self.fail("write", address);
        }
        ok
    }

    fn read_coil(&mut self, address: u16) -> Option<bool> {
        let state = self.get_coil(address);
        if state.is_none() {
            self.fail("read coil", address);
        }
        state
    }

    fn write_coil(&mut self, address: u16, state: bool) -> bool {
        if self.get_coil(address).is_none() {
            self.fail("write coil", address);
            return false;
        }
        self.set_coil(address, state);
        true
    }

    fn set_slave_id(&mut self, id: u8) -> bool {
        self.unit = id;
        true
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl RegisterBank {
    fn read_words(&mut self, address: u16, count: u16) -> Option<Vec<u16>> {
        let words = self.read_block(address, count).ok();
        if words.is_none() {
            self.fail("read", address);
        }
        words
    }
}

/// Serve Modbus TCP requests from `stream` until it closes.
pub fn serve_connection<S>(bank: &mut RegisterBank, stream: &mut S) -> Result<(), ClientError>
where
    S: Read + Write,
{
    loop {
        let frame = match Tcp::read_frame(stream) {
            Ok(frame) => frame,
            Err(ClientError::UnexpectedEof) => return Ok(()),
            Err(e) => return Err(e),
        };

        let response = match parse_request(&frame.pdu) {
            Ok((rest, request)) if rest.is_empty() => bank.handle(&request),
            _ => Response::Exception {
                function: frame.pdu[0] & 0x7f,
                code: ExceptionCode::IllegalFunction,
            },
        };

        let raw = Tcp::encode_frame(frame.transaction.unwrap_or_default(), frame.unit, &response);
        stream.write_all(&raw)?;
        stream.flush()?;
    }
}

/// A Modbus TCP server in front of a [RegisterBank].
#[derive(Debug)]
pub struct Simulator {
    listener: TcpListener,
    bank: RegisterBank,
}

impl Simulator {
    pub fn bind<A>(addr: A, bank: RegisterBank) -> std::io::Result<Self>
    where
        A: ToSocketAddrs,
    {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
            bank,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one client and serve it until it disconnects.
    pub fn serve_one(&mut self) -> Result<(), ClientError> {
        let (mut stream, peer) = self.listener.accept()?;
        tracing::debug!(%peer, "simulator accepted connection");
        serve_connection(&mut self.bank, &mut stream)?;
        tracing::debug!(%peer, "simulator connection closed");
        Ok(())
    }

    /// Serve one client on a background thread, handing the bank back
    /// once it disconnects.
    pub fn spawn_one(mut self) -> std::thread::JoinHandle<Result<RegisterBank, ClientError>> {
        std::thread::spawn(move || {
            self.serve_one()?;
            Ok(self.bank)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::TcpClient;

    #[test]
    fn bank_refuses_unmapped_reads() {
        let mut bank = RegisterBank::new();
        assert_eq!(bank.read_u16(0x1234), None);
        assert!(bank.last_error().unwrap().contains("0x1234"));
    }

    #[test]
    fn partial_block_is_refused() {
        let mut bank = RegisterBank::new();
        bank.set_u16(0x10, 1);
        assert_eq!(
            bank.handle(&Request::ReadHoldingRegisters {
                address: 0x10,
                count: 2
            }),
            Response::Exception {
                function: 0x03,
                code: ExceptionCode::IllegalDataAddress
            }
        );
        // writes are all or nothing
        assert!(!bank.write_u32(0x10, 0xffff_ffff));
        assert_eq!(bank.get_u16(0x10), Some(1));
    }

    #[test]
    fn caparoc_bank_reads() {
        let mut bank = RegisterBank::caparoc();
        assert_eq!(
            bank.read_string32(registers::PRODUCT_NAME_POWER_MODULE).as_deref(),
            Some("CAPAROC PM EIP")
        );
        assert_eq!(bank.read_u32(registers::OPERATING_HOURS), Some(1234));
        assert_eq!(bank.read_coil(3), Some(false));
        assert_eq!(bank.read_coil(8), None);
    }

    #[test]
    fn tcp_round_trip() {
        let sim = Simulator::bind("127.0.0.1:0", RegisterBank::caparoc()).unwrap();
        let addr = sim.local_addr().unwrap();
        let handle = sim.spawn_one();

        {
            let stream = std::net::TcpStream::connect(addr).unwrap();
            let mut client = TcpClient::new_tcp(stream);
            assert_eq!(client.read_u16(registers::NUM_CONNECTED_MODULES), Some(2));
            assert!(client.write_coil(2, true));
            assert_eq!(client.read_coil(2), Some(true));
            assert!(client.write_u32(registers::OPERATING_HOURS, 0x0001_0002));
            assert_eq!(client.read_u32(registers::OPERATING_HOURS), Some(0x0001_0002));
            assert_eq!(client.read_u16(0x7777), None);
            assert!(client.last_error().unwrap().contains("illegal data address"));
        }

        let bank = handle.join().unwrap().unwrap();
        assert_eq!(bank.get_coil(2), Some(true));
    }
}
