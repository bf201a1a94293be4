use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::Context;
use caplib::protocol::{BAUD_RATE, TCP_DEFAULT_UNIT, TCP_PORT};
use caplib::{Client, Device, RtuClient};

use crate::debug::DebugArgs;

/// Unit id used on a serial line when none is given.
pub const RTU_DEFAULT_UNIT: u8 = 1;

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct ConnectionArgs {
    /// IP address of the CAPAROC device
    #[arg(short, long, env = "CAPAROC_IP", default_value = "192.168.1.2")]
    pub ip: String,
    /// Modbus TCP port
    #[arg(short, long, env = "CAPAROC_PORT", default_value_t = TCP_PORT)]
    pub port: u16,
    /// Connection timeout in seconds
    #[arg(
        short,
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,
    /// Use Modbus RTU on this serial port instead of TCP
    #[arg(long, value_name = "PATH")]
    pub serial: Option<String>,
    /// Serial baud rate
    #[arg(long, default_value_t = BAUD_RATE)]
    pub baud: u32,
    /// Modbus unit id for register access [default: 255 on TCP, 1 on RTU]
    #[arg(long)]
    pub unit_id: Option<u8>,
    /// Slave id selected before reading coils
    #[arg(long, default_value_t = 1)]
    pub coil_slave_id: u8,
}

impl ConnectionArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Where we are connecting, for messages.
    pub fn target(&self) -> String {
        match self.serial {
            Some(ref path) => format!("{} ({} baud)", path, self.baud),
            None => format!("{}:{}", self.ip, self.port),
        }
    }

    pub fn open(&self, debug: &DebugArgs) -> anyhow::Result<Box<dyn Device>> {
        match self.serial {
            Some(ref path) => {
                let port = serialport::new(path, self.baud)
                    .timeout(self.timeout())
                    .open()
                    .with_context(|| {
                        format!("Failed to connect to device: cannot open {}", path)
                    })?;
                let unit = self.unit_id.unwrap_or(RTU_DEFAULT_UNIT);
                Ok(Box::new(RtuClient::new_rtu(debug.wrap(port)?, unit)))
            }
            None => {
                let stream = self.connect_tcp().map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to connect to device: {} at {}:{}",
                        e,
                        self.ip,
                        self.port
                    )
                })?;
                let unit = self.unit_id.unwrap_or(TCP_DEFAULT_UNIT);
                Ok(Box::new(Client::new_with(
                    caplib::protocol::Tcp::new(),
                    unit,
                    debug.wrap(stream)?,
                )))
            }
        }
    }

    fn connect_tcp(&self) -> std::io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.ip.as_str(), self.port).to_socket_addrs()? {
            tracing::debug!(%addr, "connecting");
            match TcpStream::connect_timeout(&addr, self.timeout()) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout()))?;
                    stream.set_write_timeout(Some(self.timeout()))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "address did not resolve")
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use caplib::simulator::{RegisterBank, Simulator};
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Wrapper {
        #[command(flatten)]
        connection: ConnectionArgs,
    }

    fn parse(args: &[&str]) -> ConnectionArgs {
        Wrapper::parse_from(std::iter::once("test").chain(args.iter().copied())).connection
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.port, 502);
        assert_eq!(args.timeout(), Duration::from_secs(3));
        assert_eq!(args.coil_slave_id, 1);
        assert_eq!(args.serial, None);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Wrapper::try_parse_from(["test", "-t", "0"]).is_err());
    }

    #[test]
    fn connects_to_simulator() {
        let sim = Simulator::bind("127.0.0.1:0", RegisterBank::caparoc()).unwrap();
        let port = sim.local_addr().unwrap().port().to_string();
        let handle = sim.spawn_one();

        let args = parse(&["-i", "127.0.0.1", "-p", &port]);
        {
            let mut dev = args.open(&DebugArgs::default()).unwrap();
            assert_eq!(dev.read_u16(caplib::registers::NUM_CONNECTED_MODULES), Some(2));
        }
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn refused_connection_names_target() {
        // grab a free port, then close it again
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let args = parse(&["-i", "127.0.0.1", "-p", &port.to_string(), "-t", "1"]);
        let err = args.open(&DebugArgs::default()).err().unwrap();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to connect to device"));
        assert!(msg.ends_with(&format!("at 127.0.0.1:{}", port)));
    }
}
