use log::debug;
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use thiserror::Error;

/// The meter family only talks 9600 7E1
pub const BAUD_RATE: u32 = 9600;
/// Large enough for the longest reply (three wrapped fields plus framing)
pub const READ_BUFFER_SIZE: usize = 128;
/// Once bytes are flowing a gap this long ends the read
const INTER_BYTE_GAP: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unable to open serial line {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("Serial line I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// A half duplex byte line to the meter. Reads are bounded by time, not by
/// delimiters, so a short or empty read is a normal outcome.
pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;
    fn read_up_to(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError>;
    fn close(&mut self);
}

/// Opens a fresh line for every session
pub trait Connector {
    type Line: Transport;

    fn open(&self, path: &str, read_timeout: Duration) -> Result<Self::Line, TransportError>;
}

pub struct SerialConnector;

impl Connector for SerialConnector {
    type Line = SerialLine;

    fn open(&self, path: &str, read_timeout: Duration) -> Result<SerialLine, TransportError> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Seven)
            .parity(Parity::Even)
            .stop_bits(StopBits::One)
            .timeout(read_timeout)
            .open()
            .map_err(|e| TransportError::Open {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Opened {} at {} 7E1", path, BAUD_RATE);
        Ok(SerialLine { port: Some(port), read_timeout })
    }
}

pub struct SerialLine {
    port: Option<Box<dyn SerialPort>>,
    read_timeout: Duration,
}

impl SerialLine {
    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut()
            .ok_or_else(|| TransportError::Io(io::Error::from(io::ErrorKind::NotConnected)))
    }
}

impl Transport for SerialLine {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(bytes.len())
    }

    fn read_up_to(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.read_timeout;
        let port = self.port()?;
        let mut buf = vec![0u8; max_bytes];
        let mut filled = 0;

        while filled < max_bytes {
            let mut remaining = deadline.saturating_duration_since(Instant::now());
            if filled > 0 {
                remaining = remaining.min(INTER_BYTE_GAP);
            }
            if remaining.is_zero() {
                break;
            }
            port.set_timeout(remaining).map_err(io::Error::from)?;

            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Serial line closed");
        }
    }
}
