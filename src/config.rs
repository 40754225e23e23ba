pub mod device_config;

pub use device_config::{load_device_config, parse_device_config, DeviceConfig, DeviceEntry};
