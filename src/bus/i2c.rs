use super::{closed_error, I2CTransport};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
#[cfg(target_os = "linux")]
use i2c_linux::I2c;
#[cfg(target_os = "linux")]
use std::io::{Read, Write};
#[cfg(target_os = "linux")]
use std::os::unix::io::IntoRawFd;
#[cfg(target_os = "linux")]
use tracing::debug;

/// ioctl request binding a 7-bit peripheral address to an i2c-dev handle,
/// issued by `smbus_set_slave_address`
pub const I2C_SLAVE: u16 = 0x0703;

const I2C_DEVICE_PREFIX: &str = "/dev/i2c-";

#[cfg(target_os = "linux")]
type Handle = I2c<File>;
#[cfg(not(target_os = "linux"))]
type Handle = File;

/// Device node for bus number `bus`, e.g. `/dev/i2c-1`
pub fn device_path(bus: u32) -> PathBuf {
    PathBuf::from(format!("{}{}", I2C_DEVICE_PREFIX, bus))
}

/// I2C bus backed by the Linux i2c-dev character device.
///
/// Requires the `i2c-dev` kernel module (`modprobe i2c-dev`).
pub struct LinuxI2CBus {
    bus: Option<Handle>,
    /// Node path - kept for logging and error messages
    path: PathBuf,
}

impl LinuxI2CBus {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bus(&mut self) -> io::Result<&mut Handle> {
        self.bus.as_mut().ok_or_else(closed_error)
    }
}

#[cfg(target_os = "linux")]
impl LinuxI2CBus {
    /// Open the bus node read-write. No peripheral is targeted until `bind`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let bus = I2c::from_path(path)?;
        debug!("[i2c] opened {}", path.display());
        Ok(Self {
            bus: Some(bus),
            path: path.to_path_buf(),
        })
    }
}

#[cfg(not(target_os = "linux"))]
impl LinuxI2CBus {
    pub fn open(path: &Path) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("I2C is only supported on Linux (requested {})", path.display()),
        ))
    }
}

#[cfg(target_os = "linux")]
impl I2CTransport for LinuxI2CBus {
    fn bind(&mut self, address: u8) -> io::Result<()> {
        self.bus()?.smbus_set_slave_address(address as u16, false)?;
        debug!(
            "[i2c] I2C_SLAVE ({:#06x}) bound {:#04x} on {}",
            I2C_SLAVE,
            address,
            self.path.display()
        );
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bus()?.write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.bus()?.read(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        let bus = self.bus.take().ok_or_else(closed_error)?;
        let fd = bus.into_inner().into_raw_fd();
        // Dropping a File swallows close(2) errors, so release the fd by hand.
        // SAFETY: into_raw_fd handed over ownership, nothing else closes this fd.
        if unsafe { libc::close(fd) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl I2CTransport for LinuxI2CBus {
    fn bind(&mut self, _address: u8) -> io::Result<()> {
        self.bus().map(drop)
    }

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        self.bus().map(|_| 0)
    }

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.bus().map(|_| 0)
    }

    fn close(&mut self) -> io::Result<()> {
        self.bus.take().map(drop).ok_or_else(closed_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_path_follows_bus_number() {
        assert_eq!(device_path(0), PathBuf::from("/dev/i2c-0"));
        assert_eq!(device_path(12), PathBuf::from("/dev/i2c-12"));
    }

    #[test]
    fn test_open_missing_node_fails() {
        let result = LinuxI2CBus::open(Path::new("/dev/i2c-does-not-exist"));
        assert!(result.is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_close_twice_reports_not_connected() {
        // /dev/null stands in for a bus node: open and close only need a real fd
        let mut bus = LinuxI2CBus::open(Path::new("/dev/null")).unwrap();
        bus.close().unwrap();

        let err = bus.close().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        let err = bus.write(&[0x01]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_bind_on_non_i2c_node_fails() {
        let mut bus = LinuxI2CBus::open(Path::new("/dev/null")).unwrap();
        assert!(bus.bind(0x48).is_err());
        // a rejected bind leaves the handle open for release
        bus.close().unwrap();
    }
}
