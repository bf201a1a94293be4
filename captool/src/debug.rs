use std::io::{Read, Write};

use caplib::protocol::serialize::{Serializer, SerializerWrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Bytes we sent.
    Host = 0,
    /// Bytes the device sent.
    Device = 1,
}

impl Direction {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Host => ">>>",
            Self::Device => "<<<",
        }
    }
}

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugArgs {
    /// Enable debug output (repeat for raw frames)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub debug: u8,
    /// Append every raw chunk sent or received to this file
    #[arg(long, value_name = "FILE")]
    dump: Option<String>,
}

impl DebugArgs {
    /// Set up logging to stderr. `RUST_LOG` still applies on top.
    pub fn init_logging(&self) {
        let default_level = match self.debug {
            0 => tracing::Level::WARN,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(default_level.into()),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn wrap<F>(&self, port: F) -> anyhow::Result<DebugPort<F>> {
        let mut dump = None;
        if let Some(ref path) = self.dump {
            dump = Some(SerializerWrap::new(
                std::fs::File::options()
                    .create(true)
                    .append(true)
                    .open(path)?,
            ));
        }

        Ok(DebugPort { port, dump })
    }
}

/// A port that traces everything passing through it.
#[derive(Debug)]
pub struct DebugPort<F> {
    port: F,
    dump: Option<SerializerWrap<std::fs::File>>,
}

impl<F> DebugPort<F> {
    fn record(&mut self, direction: Direction, data: &[u8]) -> std::io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            for line in crate::hexdump::hexdump_iter(data) {
                tracing::trace!("{} {}", direction.prefix(), line);
            }
        }

        if let Some(ref mut dump) = self.dump {
            // chunks are short, well under u16::MAX
            dump.write_u8(direction as u8)?;
            dump.write_le_u16(data.len() as u16)?;
            dump.write_bytes(data)?;
        }

        Ok(())
    }
}

impl<F> Read for DebugPort<F>
where
    F: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.port.read(buf)?;
        self.record(Direction::Device, &buf[..n])?;
        Ok(n)
    }
}

impl<F> Write for DebugPort<F>
where
    F: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.port.write(buf)?;
        self.record(Direction::Host, &buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn passes_bytes_through() {
        let mut inner = std::io::Cursor::new(vec![1u8, 2, 3]);
        let mut port = DebugArgs::default().wrap(&mut inner).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(port.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        port.write_all(&[9, 9]).unwrap();
        drop(port);
        assert_eq!(inner.into_inner(), vec![1, 2, 9, 9]);
    }

    #[test]
    fn dump_file_records_direction_and_length() {
        let path = std::env::temp_dir().join(format!("captool-dump-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let args = DebugArgs {
            debug: 0,
            dump: Some(path.to_string_lossy().into_owned()),
        };
        let mut port = args.wrap(std::io::Cursor::new(Vec::new())).unwrap();
        port.write_all(&[0xaa, 0xbb]).unwrap();
        drop(port);

        let dumped = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(dumped, vec![0, 2, 0, 0xaa, 0xbb]);
    }
}
