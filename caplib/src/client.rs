use std::io::{Read, Write};

use crate::protocol::{
    parse_response, ExceptionCode, Framing, PduSerialize, Request, Response, Rtu, Tcp,
    MAX_READ_COILS, MAX_READ_REGISTERS, TCP_DEFAULT_UNIT,
};

/// An error type for [Client].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// EOF in underlying stream.
    #[error("unexpected eof")]
    UnexpectedEof,
    /// Other IO error in underlying stream, timeouts included.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The device answered with an exception response.
    #[error("device rejected function 0x{function:02x}: {code}")]
    Exception { function: u8, code: ExceptionCode },
    /// The frame could not be understood.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// RTU checksum did not match.
    #[error("crc mismatch (calculated 0x{calculated:04x}, received 0x{provided:04x})")]
    Crc { calculated: u16, provided: u16 },
    /// TCP reply does not answer the last request.
    #[error("transaction id mismatch (sent {sent}, received {received})")]
    Transaction { sent: u16, received: u16 },
    /// RTU reply came from the wrong unit.
    #[error("reply from unit {received}, expected unit {sent}")]
    Unit { sent: u8, received: u8 },
    /// A well-formed reply that does not answer the request.
    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(Response),
    /// The request cannot be expressed on the wire.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A blocking Modbus client over some byte stream.
#[derive(Debug)]
pub struct Client<F, Fr> {
    port: F,
    framing: Fr,
    unit: u8,
    last_error: Option<String>,
}

/// A Modbus TCP client.
pub type TcpClient<F = std::net::TcpStream> = Client<F, Tcp>;

/// A Modbus RTU client.
pub type RtuClient<F> = Client<F, Rtu>;

impl<F> Client<F, Tcp> {
    /// Create a new TCP client, addressing the default TCP unit.
    pub fn new_tcp(port: F) -> Self {
        Self::new_with(Tcp::new(), TCP_DEFAULT_UNIT, port)
    }
}

impl<F> Client<F, Rtu> {
    /// Create a new RTU client addressing `unit`.
    pub fn new_rtu(port: F, unit: u8) -> Self {
        Self::new_with(Rtu::new(), unit, port)
    }
}

impl<F, Fr> Client<F, Fr> {
    /// Create a new client with the provided framing.
    pub fn new_with(framing: Fr, unit: u8, port: F) -> Self {
        Self {
            port,
            framing,
            unit,
            last_error: None,
        }
    }

    /// Release the components used to create this client.
    pub fn free(self) -> (Fr, F) {
        (self.framing, self.port)
    }

    /// Get the underlying port.
    pub fn port(&self) -> &F {
        &self.port
    }

    /// The unit id requests are addressed to.
    pub fn unit(&self) -> u8 {
        self.unit
    }

    /// Text of the most recent failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Remember a failure for [Self::last_error], then pass it on.
    pub(crate) fn record<T>(&mut self, res: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ref e) = res {
            tracing::debug!("modbus request failed: {}", e);
            self.last_error = Some(e.to_string());
        }
        res
    }
}

impl<F, Fr> Client<F, Fr>
where
    F: Read + Write,
    Fr: Framing,
{
    /// Address future requests to `unit`.
    pub fn set_unit(&mut self, unit: u8) -> Result<(), ClientError> {
        if !self.framing.accepts_unit(unit) {
            return self.record(Err(ClientError::InvalidRequest(format!(
                "unit id {} is not addressable",
                unit
            ))));
        }
        self.unit = unit;
        Ok(())
    }

    /// Send one request and wait for its response.
    ///
    /// Exception responses are turned into [ClientError::Exception].
    pub fn transact(&mut self, request: &Request) -> Result<Response, ClientError> {
        let res = self.transact_inner(request);
        self.record(res)
    }

    fn transact_inner(&mut self, request: &Request) -> Result<Response, ClientError> {
        tracing::debug!(unit = self.unit, ?request, "modbus request");

        let frame = self.framing.encode(self.unit, request);
        self.port.write_all(&frame)?;
        self.port.flush()?;

        let reply = self.framing.read_response(&mut self.port)?;
        self.framing.check_reply(self.unit, &reply)?;

        let (rest, response) = parse_response(&reply.pdu)
            .map_err(|_| ClientError::Malformed(format!("unparseable PDU {:02x?}", reply.pdu)))?;
        if !rest.is_empty() {
            return Err(ClientError::Malformed(format!(
                "{} trailing bytes after PDU",
                rest.len()
            )));
        }

        match response {
            Response::Exception { function, code } => {
                Err(ClientError::Exception { function, code })
            }
            r if r.function() != request.function_code() => {
                Err(ClientError::UnexpectedResponse(r))
            }
            r => Ok(r),
        }
    }

    /// FC03: read `count` holding registers starting at `address`.
    pub fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ClientError> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return self.record(Err(ClientError::InvalidRequest(format!(
                "cannot read {} registers at once",
                count
            ))));
        }
        match self.transact(&Request::ReadHoldingRegisters { address, count })? {
            Response::ReadHoldingRegisters(values) if values.len() == count as usize => Ok(values),
            other => self.record(Err(ClientError::UnexpectedResponse(other))),
        }
    }

    /// FC01: read `count` coils starting at `address`.
    pub fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, ClientError> {
        if count == 0 || count > MAX_READ_COILS {
            return self.record(Err(ClientError::InvalidRequest(format!(
                "cannot read {} coils at once",
                count
            ))));
        }
        match self.transact(&Request::ReadCoils { address, count })? {
            Response::ReadCoils(mut states) if states.len() >= count as usize => {
                states.truncate(count as usize);
                Ok(states)
            }
            other => self.record(Err(ClientError::UnexpectedResponse(other))),
        }
    }

    /// FC06: write one holding register.
    pub fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), ClientError> {
        match self.transact(&Request::WriteSingleRegister { address, value })? {
            Response::WriteSingleRegister {
                address: a,
                value: v,
            } if a == address && v == value => Ok(()),
            other => self.record(Err(ClientError::UnexpectedResponse(other))),
        }
    }

    /// FC16: write consecutive holding registers.
    pub fn write_multiple_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> Result<(), ClientError> {
        if values.is_empty() || values.len() > 123 {
            return self.record(Err(ClientError::InvalidRequest(format!(
                "cannot write {} registers at once",
                values.len()
            ))));
        }
        let request = Request::WriteMultipleRegisters {
            address,
            values: values.to_vec(),
        };
        match self.transact(&request)? {
            Response::WriteMultipleRegisters {
                address: a,
                count: c,
            } if a == address && c as usize == values.len() => Ok(()),
            other => self.record(Err(ClientError::UnexpectedResponse(other))),
        }
    }

    /// FC05: switch one coil.
    pub fn write_single_coil(&mut self, address: u16, state: bool) -> Result<(), ClientError> {
        match self.transact(&Request::WriteSingleCoil { address, state })? {
            Response::WriteSingleCoil {
                address: a,
                state: s,
            } if a == address && s == state => Ok(()),
            other => self.record(Err(ClientError::UnexpectedResponse(other))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::simulator::{serve_connection, RegisterBank};

    /// A port that replays canned bytes and records what was written.
    struct Scripted {
        input: std::io::Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Scripted {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: std::io::Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` against a simulated device: once to capture the request
    /// frames it sends, then again with the device's answers queued up.
    fn against_bank<T>(
        bank: &mut RegisterBank,
        mut f: impl FnMut(&mut TcpClient<Scripted>) -> T,
    ) -> T {
        let mut probe = TcpClient::new_tcp(Scripted::new(Vec::new()));
        let _ = f(&mut probe);
        let (_, port) = probe.free();

        let mut replies = Vec::new();
        serve_connection(bank, &mut DuplexPair(&port.output[..], &mut replies)).unwrap();
        f(&mut TcpClient::new_tcp(Scripted::new(replies)))
    }

    struct DuplexPair<'a>(&'a [u8], &'a mut Vec<u8>);

    impl Read for DuplexPair<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for DuplexPair<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.1.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_registers_from_simulated_device() {
        let mut bank = RegisterBank::new();
        bank.set_u16(0x2000, 3);
        let values = against_bank(&mut bank, |c| c.read_holding_registers(0x2000, 1));
        assert_eq!(values.unwrap(), vec![3]);
    }

    #[test]
    fn exception_is_reported_and_remembered() {
        let mut bank = RegisterBank::new();
        let mut last = None;
        let res = against_bank(&mut bank, |c| {
            let res = c.read_holding_registers(0x4242, 1);
            last = c.last_error().map(str::to_owned);
            res
        });
        assert!(matches!(
            res,
            Err(ClientError::Exception {
                function: 0x03,
                code: ExceptionCode::IllegalDataAddress
            })
        ));
        assert!(last.unwrap().contains("illegal data address"));
    }

    #[test]
    fn write_then_echo() {
        let mut bank = RegisterBank::new();
        bank.set_u16(0x5000, 0);
        let res = against_bank(&mut bank, |c| c.write_single_register(0x5000, 6));
        assert!(res.is_ok());
        assert_eq!(bank.get_u16(0x5000), Some(6));
    }

    #[test]
    fn read_count_limits() {
        let mut client = TcpClient::new_tcp(Scripted::new(Vec::new()));
        assert!(matches!(
            client.read_holding_registers(0, 0),
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(matches!(
            client.read_holding_registers(0, 126),
            Err(ClientError::InvalidRequest(_))
        ));
        // nothing went out on the wire
        assert!(client.port().output.is_empty());
    }

    #[test]
    fn silent_device_is_eof() {
        let mut client = TcpClient::new_tcp(Scripted::new(Vec::new()));
        assert!(matches!(
            client.write_single_coil(1, true),
            Err(ClientError::UnexpectedEof)
        ));
        assert_eq!(client.last_error(), Some("unexpected eof"));
    }

    /// A port whose first read times out, with the device answering late.
    struct LateOnce {
        timed_out: bool,
        input: std::io::Cursor<Vec<u8>>,
    }

    impl Read for LateOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.timed_out {
                self.timed_out = true;
                return Err(std::io::ErrorKind::TimedOut.into());
            }
            self.input.read(buf)
        }
    }

    impl Write for LateOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn one_timeout_fails_one_request() {
        let mut replies = Vec::new();
        for tid in 1..=4u16 {
            replies.extend(Tcp::encode_frame(
                tid,
                TCP_DEFAULT_UNIT,
                &Response::ReadHoldingRegisters(vec![tid * 10]),
            ));
        }
        let mut client = TcpClient::new_tcp(LateOnce {
            timed_out: false,
            input: std::io::Cursor::new(replies),
        });

        assert!(matches!(
            client.read_holding_registers(0, 1),
            Err(ClientError::Io(_))
        ));
        for tid in 2..=4u16 {
            assert_eq!(client.read_holding_registers(0, 1).unwrap(), vec![tid * 10]);
        }
    }

    #[test]
    fn rtu_unit_range() {
        let mut client = RtuClient::new_rtu(Scripted::new(Vec::new()), 1);
        assert!(client.set_unit(247).is_ok());
        assert!(client.set_unit(248).is_err());
        assert_eq!(client.unit(), 247);
    }
}
