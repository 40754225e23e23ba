use std::io;

pub mod i2c;
pub mod sim;

/// A byte stream that can be bound to one peripheral address on an I2C bus.
///
/// `BusConnection` layers the register and UUID conventions on top of this,
/// so the Linux character device and the in-memory `SimulatedPeripheral`
/// are interchangeable.
pub trait I2CTransport {
    /// Target `address` with all subsequent reads and writes
    fn bind(&mut self, address: u8) -> io::Result<()>;

    /// Write `buf` verbatim, returning how many bytes the bus accepted
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes. A short count is not an error here.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the underlying handle.
    ///
    /// Calling this on a released handle fails with `NotConnected`, as does
    /// any read or write after it.
    fn close(&mut self) -> io::Result<()>;
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "I2C bus handle is closed")
}
