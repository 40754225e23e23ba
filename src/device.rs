use crate::bus::i2c::{device_path, LinuxI2CBus};
use crate::bus::I2CTransport;
use crate::errors::{DeviceError, DeviceResult, PartialUuid};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

// Register conventions of the peripheral protocol
pub const VERSION_REGISTER: u8 = 0x05;
pub const UUID_REGISTER: u8 = 0x06;

pub const UUID_LENGTH: usize = 16;
/// Bytes returned by every register read
pub const REGISTER_REPLY_LEN: usize = 2;
/// Time the peripheral gets to prepare a register reply
pub const DEFAULT_REGISTER_DELAY: Duration = Duration::from_millis(10);

/// Identifier stored on the peripheral
pub type DeviceUuid = [u8; UUID_LENGTH];

/// Connection to one peripheral address on one I2C bus.
///
/// Single owner, blocking, no internal locking. Release it with `close`.
pub struct BusConnection<T: I2CTransport = LinuxI2CBus> {
    transport: T,
    path: PathBuf,
    address: u8,
    register_delay: Duration,
    identifier: DeviceUuid,
}

impl BusConnection<LinuxI2CBus> {
    /// Open `/dev/i2c-<bus>` and bind it to `address`
    pub fn open(address: u8, bus: u32) -> DeviceResult<Self> {
        Self::connect_with(address, bus, LinuxI2CBus::open)
    }
}

impl<T: I2CTransport> BusConnection<T> {
    /// Open the node for `bus` with `opener`, then bind `address` on it.
    ///
    /// An opener failure is `DeviceError::Open`, a bind failure is
    /// `DeviceError::Bind`. The handle is released again when binding fails.
    pub fn connect_with<F>(address: u8, bus: u32, opener: F) -> DeviceResult<Self>
    where
        F: FnOnce(&Path) -> io::Result<T>,
    {
        let path = device_path(bus);
        let mut transport = opener(&path).map_err(|source| DeviceError::Open {
            path: path.display().to_string(),
            source,
        })?;

        if let Err(source) = transport.bind(address) {
            if let Err(e) = transport.close() {
                debug!("[i2c] releasing {} after failed bind: {}", path.display(), e);
            }
            return Err(DeviceError::Bind {
                path: path.display().to_string(),
                address,
                source,
            });
        }

        info!("[i2c] connected to {:#04x} on {}", address, path.display());
        Ok(Self {
            transport,
            path,
            address,
            register_delay: DEFAULT_REGISTER_DELAY,
            identifier: [0u8; UUID_LENGTH],
        })
    }

    /// Replace the wait between selecting a register and reading its reply
    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = delay;
        self
    }

    pub fn register_delay(&self) -> Duration {
        self.register_delay
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Last UUID obtained by a complete `uuid` or `write_uuid`; zero until then
    pub fn identifier(&self) -> DeviceUuid {
        self.identifier
    }

    fn io_error(&self, op: &'static str, source: io::Error) -> DeviceError {
        DeviceError::Io {
            path: self.path.display().to_string(),
            op,
            source,
        }
    }

    /// Every outgoing transfer goes through here
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.transport.write(buf)?;
        debug!("[i2c] {:#04x} <- {:02x?} ({} written)", self.address, buf, written);
        Ok(written)
    }

    /// Send `buf` to the peripheral as is
    pub fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        self.send(buf).map_err(|e| self.io_error("write", e))
    }

    pub fn write_byte(&mut self, byte: u8) -> DeviceResult<usize> {
        self.write(&[byte])
    }

    /// Read up to `buf.len()` bytes; fewer is not an error
    pub fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let read = self
            .transport
            .read(buf)
            .map_err(|e| self.io_error("read", e))?;
        if read > buf.len() {
            let source = io::Error::new(
                io::ErrorKind::InvalidData,
                format!("transport reported {} byte(s) for a {}-byte buffer", read, buf.len()),
            );
            return Err(self.io_error("read", source));
        }
        debug!("[i2c] {:#04x} -> {:02x?}", self.address, &buf[..read]);
        Ok(read)
    }

    /// Select `register`, wait the register delay, then read its 2-byte reply
    pub fn read_register(&mut self, register: u8) -> DeviceResult<[u8; REGISTER_REPLY_LEN]> {
        let written = self.write_byte(register)?;
        if written != 1 {
            warn!(
                "[i2c] register select {:#04x} on {:#04x} wrote {} byte(s)",
                register, self.address, written
            );
            let source = io::Error::new(
                io::ErrorKind::WriteZero,
                format!("register select {:#04x} was not written", register),
            );
            return Err(self.io_error("write", source));
        }
        if !self.register_delay.is_zero() {
            thread::sleep(self.register_delay);
        }

        let mut reply = [0u8; REGISTER_REPLY_LEN];
        let read = self.read(&mut reply)?;
        if read != REGISTER_REPLY_LEN {
            warn!(
                "[i2c] register {:#04x} on {:#04x} returned {} byte(s)",
                register, self.address, read
            );
            return Err(DeviceError::ShortRead {
                register,
                read,
                expected: REGISTER_REPLY_LEN,
            });
        }
        Ok(reply)
    }

    /// Raw contents of the version register
    pub fn version(&mut self) -> DeviceResult<[u8; REGISTER_REPLY_LEN]> {
        self.read_register(VERSION_REGISTER)
    }

    /// Read the stored UUID as 8 consecutive reads of the UUID register.
    ///
    /// Stops at the first failing read; the bytes gathered so far come back
    /// inside the `PartialUuid` error.
    pub fn uuid(&mut self) -> Result<DeviceUuid, PartialUuid> {
        let mut uuid = [0u8; UUID_LENGTH];
        let mut filled = 0;
        while filled < UUID_LENGTH {
            let reply = match self.read_register(UUID_REGISTER) {
                Ok(reply) => reply,
                Err(error) => {
                    warn!(
                        "[i2c] UUID read from {:#04x} stopped after {} byte(s)",
                        self.address, filled
                    );
                    return Err(PartialUuid {
                        bytes: uuid,
                        filled,
                        error,
                    });
                }
            };
            uuid[filled..filled + REGISTER_REPLY_LEN].copy_from_slice(&reply);
            filled += REGISTER_REPLY_LEN;
        }

        self.identifier = uuid;
        Ok(uuid)
    }

    /// Write `uuid` as 16 single-byte writes.
    ///
    /// Bytes sent before a failure stay on the peripheral.
    pub fn write_uuid(&mut self, uuid: &DeviceUuid) -> DeviceResult<()> {
        for (index, &byte) in uuid.iter().enumerate() {
            let (written, source) = match self.send(&[byte]) {
                Ok(1) => continue,
                Ok(n) => (n, None),
                Err(e) => (0, Some(e)),
            };
            warn!(
                "[i2c] UUID write to {:#04x} failed at byte {} ({} written)",
                self.address, index, written
            );
            return Err(DeviceError::PartialWrite {
                index,
                written,
                source,
            });
        }

        debug!("[i2c] wrote UUID to {:#04x}", self.address);
        self.identifier = *uuid;
        Ok(())
    }

    /// Release the handle. Always attempted, whatever happened before.
    pub fn close(mut self) -> DeviceResult<()> {
        self.transport.close().map_err(|source| DeviceError::Close {
            path: self.path.display().to_string(),
            source,
        })?;
        info!("[i2c] closed {}", self.path.display());
        Ok(())
    }
}
