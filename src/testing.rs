//! Scripted in-memory devices for driving sessions and discovery without hardware.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::{Connector, Transport};

#[derive(Default)]
struct DeviceState {
    // `None` is a read that times out
    replies: VecDeque<Option<Vec<u8>>>,
    ack_when_idle: bool,
    fail_writes: bool,
    fail_reads: bool,
    written: Vec<u8>,
    opens: usize,
    open: bool,
}

#[derive(Clone, Default)]
pub struct MockDevice(Rc<RefCell<DeviceState>>);

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one reply line.
    pub fn reply(self, line: &str) -> Self {
        self.0.borrow_mut().replies.push_back(Some(line.as_bytes().to_vec()));
        self
    }

    /// Queues one read that times out.
    pub fn silence(self) -> Self {
        self.0.borrow_mut().replies.push_back(None);
        self
    }

    /// Answers COMMAND_RECEIVED once the queued replies run out.
    pub fn ack_when_idle(self) -> Self {
        self.0.borrow_mut().ack_when_idle = true;
        self
    }

    /// Every read fails with an I/O error.
    pub fn failing_reads(self) -> Self {
        self.0.borrow_mut().fail_reads = true;
        self
    }

    pub fn fail_writes(&self) {
        self.0.borrow_mut().fail_writes = true;
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow().written).into_owned()
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.written().lines().map(str::to_string).collect()
    }

    pub fn clear_written(&self) {
        self.0.borrow_mut().written.clear();
    }

    pub fn opens(&self) -> usize {
        self.0.borrow().opens
    }

    pub fn is_open(&self) -> bool {
        self.0.borrow().open
    }
}

pub struct MockPort(MockDevice);

impl Transport for MockPort {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.0.0.borrow_mut();
        if state.fail_writes {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged").into());
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut state = self.0.0.borrow_mut();
        if state.fail_reads {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged").into());
        }
        match state.replies.pop_front() {
            Some(reply) => Ok(reply),
            None if state.ack_when_idle => Ok(Some(b"COMMAND_RECEIVED\n".to_vec())),
            None => Ok(None),
        }
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        self.0.0.borrow_mut().open = false;
    }
}

#[derive(Default)]
pub struct MockConnector {
    devices: RefCell<BTreeMap<String, MockDevice>>,
    attempts: RefCell<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, name: &str, device: &MockDevice) {
        self.devices.borrow_mut().insert(name.to_string(), device.clone());
    }

    pub fn open_attempts(&self) -> Vec<String> {
        self.attempts.borrow().clone()
    }
}

impl Connector for MockConnector {
    type Port = MockPort;

    fn open(&self, port: &str, _timeout: Duration) -> Result<MockPort, TransportError> {
        self.attempts.borrow_mut().push(port.to_string());
        let device = self.devices.borrow().get(port).cloned().ok_or_else(|| {
            TransportError::Open { port: port.to_string(), reason: String::from("no such port") }
        })?;
        {
            let mut state = device.0.borrow_mut();
            state.opens += 1;
            state.open = true;
        }
        Ok(MockPort(device))
    }

    fn available(&self) -> Vec<String> {
        self.devices.borrow().keys().cloned().collect()
    }
}
