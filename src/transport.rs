use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use common::comm_messages::{BAUD_RATE, MAX_REPLY_LEN};
use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::TransportError;

/// An open byte stream to the device.
pub trait Transport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Reads up to and including the next `\n`. `Ok(None)` means the read timeout elapsed
    /// before any byte arrived.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Opens transports by port name. Dropping the returned transport closes it.
pub trait Connector {
    type Port: Transport;

    fn open(&self, port: &str, timeout: Duration) -> Result<Self::Port, TransportError>;

    /// Port names the operating system currently knows about.
    fn available(&self) -> Vec<String> {
        Vec::new()
    }
}

pub struct SerialConnector;

impl Connector for SerialConnector {
    type Port = SerialLink;

    fn open(&self, port: &str, timeout: Duration) -> Result<SerialLink, TransportError> {
        let handle = serialport::new(port, BAUD_RATE)
            .timeout(timeout)
            .flow_control(FlowControl::None)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .data_bits(DataBits::Eight)
            .open()
            .map_err(|e| TransportError::Open { port: port.to_string(), reason: e.to_string() })?;
        debug!("Opened {} at {} baud", port, BAUD_RATE);
        Ok(SerialLink { port: handle })
    }

    fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                debug!("Could not list serial ports: {}", e);
                Vec::new()
            }
        };
        names.sort();
        names
    }
}

pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl Transport for SerialLink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let deadline = Instant::now() + self.port.timeout();
        read_line_until(&mut self.port, deadline, MAX_REPLY_LEN)
    }
}

/// Reads one byte at a time up to and including `\n`. Stops early, handing back whatever
/// arrived, once `max_len` bytes were read or `deadline` passed, so a device streaming
/// garbage without newlines cannot hold the caller.
pub(crate) fn read_line_until<R: Read>(
    reader: &mut R,
    deadline: Instant,
    max_len: usize,
) -> Result<Option<Vec<u8>>, TransportError> {
    let mut line = Vec::new();
    let mut byte: [u8; 1] = [0];
    while line.len() < max_len && Instant::now() < deadline {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(if line.is_empty() { None } else { Some(line) })
}
