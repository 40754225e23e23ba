use crate::bus::i2c::LinuxI2CBus;
use crate::device::{BusConnection, DEFAULT_REGISTER_DELAY};
use crate::errors::{ConfigError, ConfigResult, DeviceResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::time::Duration;
use tracing::info;

/// Highest 7-bit peripheral address
const MAX_ADDRESS: u8 = 0x7F;

/// Root configuration struct expecting `[[device]]` TOML array format
#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    #[serde(rename = "device", default)]
    pub devices: Vec<DeviceEntry>,
}

/// One peripheral, matching each `[[device]]` section
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub bus: u32,
    pub address: u8,
    /// Milliseconds between register select and reply; 10 when absent
    pub register_delay_ms: Option<u64>,
}

impl DeviceEntry {
    pub fn register_delay(&self) -> Duration {
        self.register_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REGISTER_DELAY)
    }

    /// Open the configured bus and bind the configured address
    pub fn connect(&self) -> DeviceResult<BusConnection<LinuxI2CBus>> {
        let conn = BusConnection::open(self.address, self.bus)?;
        Ok(conn.with_register_delay(self.register_delay()))
    }
}

impl DeviceConfig {
    pub fn find(&self, id: &str) -> ConfigResult<&DeviceEntry> {
        self.devices
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| ConfigError::UnknownDevice { id: id.to_string() })
    }

    fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for d in &self.devices {
            if d.address > MAX_ADDRESS {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.address", d.id),
                    reason: format!("{:#04x} is not a 7-bit address", d.address),
                });
            }
            if !seen.insert(d.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.id", d.id),
                    reason: "duplicate device id".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Parse and validate config text
pub fn parse_device_config(content: &str) -> ConfigResult<DeviceConfig> {
    let parsed: DeviceConfig = toml::from_str(content)?;
    parsed.validate()?;
    Ok(parsed)
}

/// Loads config from TOML file
pub fn load_device_config(path: &str) -> ConfigResult<DeviceConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    let parsed = parse_device_config(&content)?;
    info!("[config] loaded {} device(s) from {}", parsed.devices.len(), path);
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[device]]
        id = "probe"
        bus = 1
        address = 0x48

        [[device]]
        id = "tag"
        bus = 0
        address = 0x21
        register_delay_ms = 25
    "#;

    #[test]
    fn test_parse_device_entries() {
        let config = parse_device_config(SAMPLE).unwrap();
        assert_eq!(config.devices.len(), 2);

        let probe = config.find("probe").unwrap();
        assert_eq!(probe.bus, 1);
        assert_eq!(probe.address, 0x48);
        assert_eq!(probe.register_delay(), DEFAULT_REGISTER_DELAY);

        let tag = config.find("tag").unwrap();
        assert_eq!(tag.register_delay(), Duration::from_millis(25));
    }

    #[test]
    fn test_empty_config_has_no_devices() {
        let config = parse_device_config("").unwrap();
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_unknown_device() {
        let config = parse_device_config(SAMPLE).unwrap();
        assert!(matches!(
            config.find("missing"),
            Err(ConfigError::UnknownDevice { id }) if id == "missing"
        ));
    }

    #[test]
    fn test_rejects_eight_bit_address() {
        let err = parse_device_config("[[device]]\nid = \"x\"\nbus = 1\naddress = 0x80\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "x.address"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let text = "[[device]]\nid = \"a\"\nbus = 1\naddress = 1\n\n[[device]]\nid = \"a\"\nbus = 2\naddress = 2\n";
        assert!(matches!(
            parse_device_config(text),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_malformed_toml_is_format_error() {
        assert!(matches!(
            parse_device_config("[[device]]\nid = 3\n"),
            Err(ConfigError::FormatError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = load_device_config("/nonexistent/devices.toml").unwrap_err();
        assert!(matches!(err, ConfigError::LoadError { .. }));
    }
}
