// Public modules
pub mod bus;
pub mod config;
pub mod device;
pub mod errors;

// Re-export commonly used types
pub use bus::i2c::LinuxI2CBus;
pub use bus::sim::SimulatedPeripheral;
pub use bus::I2CTransport;
pub use config::{load_device_config, parse_device_config, DeviceConfig, DeviceEntry};
pub use device::{
    BusConnection, DeviceUuid, DEFAULT_REGISTER_DELAY, REGISTER_REPLY_LEN, UUID_LENGTH,
    UUID_REGISTER, VERSION_REGISTER,
};
pub use errors::{ConfigError, ConfigResult, DeviceError, DeviceResult, PartialUuid};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with default configuration
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}
