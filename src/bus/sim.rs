use super::{closed_error, I2CTransport};
use crate::device::{DeviceUuid, UUID_LENGTH, UUID_REGISTER, VERSION_REGISTER};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use tracing::debug;

/// One transfer seen by a `SimulatedPeripheral`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Bind(u8),
    Write(Vec<u8>),
    Read { requested: usize },
    Close,
}

/// Canned answer for the next read request
#[derive(Debug, Clone)]
pub enum Reply {
    Bytes(Vec<u8>),
    Fail(io::ErrorKind),
}

/// What the n-th write does instead of succeeding
#[derive(Debug, Clone, Copy)]
pub enum WriteFault {
    /// Report zero bytes written without an error
    Zero,
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct SimState {
    log: Vec<Op>,
    replies: VecDeque<Reply>,
    write_faults: Vec<(usize, WriteFault)>,
    writes_seen: usize,
    bind_fault: Option<io::ErrorKind>,
    close_fault: Option<io::ErrorKind>,
    closed: bool,
    bound: Option<u8>,
    version: [u8; 2],
    pending: Vec<u8>,
    selected: Option<u8>,
    stored_uuid: DeviceUuid,
    uuid_cursor: usize,
}

/// In-memory stand-in for an i2c peripheral.
///
/// Clones share state, so a test can keep one handle while the connection owns
/// another. Scripted replies are served first. Without them the peripheral
/// answers register reads itself:
/// - the byte written last before a read is the selected register
/// - bytes written before that select (at least 16) latch as the stored UUID
/// - `UUID_REGISTER` serves the stored UUID two bytes at a time, wrapping at 16
/// - `VERSION_REGISTER` serves the version word
#[derive(Debug, Clone, Default)]
pub struct SimulatedPeripheral {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedPeripheral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies for upcoming read requests, in order
    pub fn with_replies<I>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        self.state.borrow_mut().replies.extend(replies);
        self
    }

    /// Make the `nth` write (1-based, counted over the peripheral's lifetime) misbehave
    pub fn with_write_fault(self, nth: usize, fault: WriteFault) -> Self {
        self.state.borrow_mut().write_faults.push((nth, fault));
        self
    }

    pub fn with_bind_fault(self, kind: io::ErrorKind) -> Self {
        self.state.borrow_mut().bind_fault = Some(kind);
        self
    }

    pub fn with_close_fault(self, kind: io::ErrorKind) -> Self {
        self.state.borrow_mut().close_fault = Some(kind);
        self
    }

    pub fn with_version(self, version: [u8; 2]) -> Self {
        self.state.borrow_mut().version = version;
        self
    }

    pub fn with_stored_uuid(self, uuid: DeviceUuid) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.stored_uuid = uuid;
            state.uuid_cursor = 0;
        }
        self
    }

    /// Every transfer so far, oldest first
    pub fn ops(&self) -> Vec<Op> {
        self.state.borrow().log.clone()
    }

    /// Bytes of every write, in order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state
            .borrow()
            .log
            .iter()
            .filter_map(|op| match op {
                Op::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn stored_uuid(&self) -> DeviceUuid {
        self.state.borrow().stored_uuid
    }

    pub fn bound_address(&self) -> Option<u8> {
        self.state.borrow().bound
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl SimState {
    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        Ok(())
    }

    fn select_register(&mut self) {
        if let Some(register) = self.pending.pop() {
            if self.pending.len() >= UUID_LENGTH {
                let start = self.pending.len() - UUID_LENGTH;
                self.stored_uuid.copy_from_slice(&self.pending[start..]);
                self.uuid_cursor = 0;
                debug!("[sim] latched UUID from {} written byte(s)", self.pending.len());
            }
            self.selected = Some(register);
        }
        self.pending.clear();
    }

    fn register_reply(&mut self, buf: &mut [u8]) -> usize {
        let source: Vec<u8> = match self.selected {
            Some(UUID_REGISTER) => {
                let at = self.uuid_cursor;
                let chunk = self.stored_uuid[at..at + 2].to_vec();
                self.uuid_cursor = (at + 2) % UUID_LENGTH;
                chunk
            }
            Some(VERSION_REGISTER) => self.version.to_vec(),
            _ => Vec::new(),
        };
        let n = source.len().min(buf.len());
        buf[..n].copy_from_slice(&source[..n]);
        n
    }
}

impl I2CTransport for SimulatedPeripheral {
    fn bind(&mut self, address: u8) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.log.push(Op::Bind(address));
        if let Some(kind) = state.bind_fault {
            return Err(io::Error::new(kind, "simulated bind failure"));
        }
        state.bound = Some(address);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.log.push(Op::Write(buf.to_vec()));
        state.writes_seen += 1;

        let nth = state.writes_seen;
        let fault = state
            .write_faults
            .iter()
            .find(|(at, _)| *at == nth)
            .map(|(_, fault)| *fault);
        match fault {
            Some(WriteFault::Zero) => Ok(0),
            Some(WriteFault::Fail(kind)) => Err(io::Error::new(kind, "simulated write failure")),
            None => {
                state.pending.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.log.push(Op::Read { requested: buf.len() });
        state.select_register();

        match state.replies.pop_front() {
            Some(Reply::Bytes(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Reply::Fail(kind)) => Err(io::Error::new(kind, "simulated read failure")),
            None => Ok(state.register_reply(buf)),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.log.push(Op::Close);
        // the handle is gone even when the release reports an error
        state.closed = true;
        if let Some(kind) = state.close_fault {
            return Err(io::Error::new(kind, "simulated close failure"));
        }
        Ok(())
    }
}
