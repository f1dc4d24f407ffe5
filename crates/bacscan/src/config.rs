//! Configuration
//!
//! Layered with figment: built-in defaults, then a TOML file, then
//! `BACSCAN_*` environment variables. Nested keys use a double underscore,
//! e.g. `BACSCAN_LOCAL_DEVICE__OBJECT_NAME`.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::bacnet::{ObjectIdentifier, Segmentation, WhoIsRequest};
use crate::discovery::SchedulerConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::transport::SimulatedDevice;

/// File read when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "bacscan.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "BACSCAN_";

/// Smallest APDU any BACnet device must accept
const MIN_APDU_LENGTH: u16 = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Discovery Config
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Seconds between Who-Is broadcasts
    pub discovery_interval: u64,
    /// Seconds between status reports
    pub report_interval: u64,
    /// Broadcast one Who-Is as soon as the service starts
    pub probe_on_start: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who_is_low_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who_is_high_limit: Option<u32>,
    pub local_device: LocalDeviceConfig,
    pub simulation: SimulationConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discovery_interval: 30,
            report_interval: 60,
            probe_on_start: true,
            who_is_low_limit: None,
            who_is_high_limit: None,
            local_device: LocalDeviceConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

/// Identity of the device this engine runs as
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDeviceConfig {
    pub object_name: String,
    /// Device instance number
    pub object_identifier: u32,
    /// Local address, optionally with a prefix length (`192.168.1.5/24`)
    pub address: String,
    pub max_apdu_length_accepted: u16,
    pub segmentation_supported: Segmentation,
    pub vendor_identifier: u16,
}

impl Default for LocalDeviceConfig {
    fn default() -> Self {
        Self {
            object_name: "bacscan".to_string(),
            object_identifier: 599,
            address: "0.0.0.0:47808".to_string(),
            max_apdu_length_accepted: 1024,
            segmentation_supported: Segmentation::Both,
            vendor_identifier: 15,
        }
    }
}

/// Devices placed on the simulated network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub devices: Vec<SimulatedDevice>,
}

impl DiscoveryConfig {
    /// Build the provider chain
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn figment(path: Option<&Path>) -> DiscoveryResult<Figment> {
        let figment = Figment::from(Serialized::defaults(DiscoveryConfig::default()));

        let figment = match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(DiscoveryError::Config(format!(
                        "config file {} not found",
                        path.display()
                    )));
                }
                figment.merge(Toml::file(path))
            }
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate
    pub fn load(path: Option<&Path>) -> DiscoveryResult<Self> {
        let config: Self = Self::figment(path)?
            .extract()
            .map_err(|e| DiscoveryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DiscoveryResult<()> {
        if self.discovery_interval == 0 {
            return Err(DiscoveryError::Config("discovery_interval must be at least 1 second".into()));
        }
        if self.report_interval == 0 {
            return Err(DiscoveryError::Config("report_interval must be at least 1 second".into()));
        }

        match (self.who_is_low_limit, self.who_is_high_limit) {
            (None, None) => {}
            (Some(low), Some(high)) => {
                if low > high {
                    return Err(DiscoveryError::Config(format!(
                        "who_is_low_limit {} exceeds who_is_high_limit {}",
                        low, high
                    )));
                }
                if high > ObjectIdentifier::MAX_INSTANCE {
                    return Err(DiscoveryError::Config(format!(
                        "who_is_high_limit {} exceeds {}",
                        high,
                        ObjectIdentifier::MAX_INSTANCE
                    )));
                }
            }
            _ => {
                return Err(DiscoveryError::Config(
                    "who_is_low_limit and who_is_high_limit must be set together".into(),
                ));
            }
        }

        let local = &self.local_device;
        if local.object_name.trim().is_empty() {
            return Err(DiscoveryError::Config("local_device.object_name is empty".into()));
        }
        if local.object_identifier > ObjectIdentifier::MAX_INSTANCE {
            return Err(DiscoveryError::Config(format!(
                "local_device.object_identifier {} exceeds {}",
                local.object_identifier,
                ObjectIdentifier::MAX_INSTANCE
            )));
        }
        if local.max_apdu_length_accepted < MIN_APDU_LENGTH {
            return Err(DiscoveryError::Config(format!(
                "local_device.max_apdu_length_accepted must be at least {}",
                MIN_APDU_LENGTH
            )));
        }

        for (index, device) in self.simulation.devices.iter().enumerate() {
            if device.address.trim().is_empty() {
                return Err(DiscoveryError::Config(format!(
                    "simulation device {} has no address",
                    device.device_id
                )));
            }
            if device.device_id > ObjectIdentifier::MAX_INSTANCE {
                return Err(DiscoveryError::Config(format!(
                    "simulation device {} exceeds {}",
                    device.device_id,
                    ObjectIdentifier::MAX_INSTANCE
                )));
            }
            if self.simulation.devices[..index]
                .iter()
                .any(|other| other.device_id == device.device_id)
            {
                return Err(DiscoveryError::Config(format!(
                    "simulation device {} defined twice",
                    device.device_id
                )));
            }
        }

        Ok(())
    }

    pub fn discovery_period(&self) -> Duration {
        Duration::from_secs(self.discovery_interval)
    }

    pub fn report_period(&self) -> Duration {
        Duration::from_secs(self.report_interval)
    }

    pub fn who_is(&self) -> WhoIsRequest {
        match (self.who_is_low_limit, self.who_is_high_limit) {
            (Some(low), Some(high)) => WhoIsRequest::range(low, high),
            _ => WhoIsRequest::global(),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            discovery_interval: self.discovery_period(),
            report_interval: self.report_period(),
            who_is: self.who_is(),
        }
    }

    pub fn to_toml_string(&self) -> DiscoveryResult<String> {
        toml::to_string_pretty(self).map_err(|e| DiscoveryError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use figment::Jail;

    use crate::bacnet::ObjectType;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.discovery_period(), Duration::from_secs(30));
        assert_eq!(config.report_period(), Duration::from_secs(60));
        assert_eq!(config.who_is(), WhoIsRequest::global());
        assert!(config.probe_on_start);
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                discovery_interval = 10
                who_is_low_limit = 1000
                who_is_high_limit = 1999

                [local_device]
                object_name = "Scanner"
                object_identifier = 389001
                segmentation_supported = "segmentedBoth"
                "#,
            )?;
            jail.set_env("BACSCAN_REPORT_INTERVAL", 5);
            jail.set_env("BACSCAN_LOCAL_DEVICE__VENDOR_IDENTIFIER", 260);

            let config = DiscoveryConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.discovery_interval, 10);
            assert_eq!(config.report_interval, 5);
            assert_eq!(config.who_is(), WhoIsRequest::range(1000, 1999));
            assert_eq!(config.local_device.object_name, "Scanner");
            assert_eq!(config.local_device.object_identifier, 389001);
            assert_eq!(config.local_device.vendor_identifier, 260);
            assert_eq!(config.local_device.max_apdu_length_accepted, 1024);
            assert_eq!(config.local_device.segmentation_supported, Segmentation::Both);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "discovery_interval = 10")?;
            jail.set_env("BACSCAN_DISCOVERY_INTERVAL", 45);

            let config = DiscoveryConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.discovery_interval, 45);
            Ok(())
        });
    }

    #[test]
    fn test_missing_default_file_is_fine() {
        Jail::expect_with(|_| {
            let config = DiscoveryConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, DiscoveryConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_with_simulation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            probe_on_start = false

            [[simulation.devices]]
            device_id = 1001
            address = "10.0.0.1:47808"
            objects = ["analog-input:1", "binary-value:2"]

            [[simulation.devices]]
            device_id = 1002
            address = "10.0.0.2:47808"
            encoding = "array"
            null_padding = true
            "#
        )
        .unwrap();

        let config = DiscoveryConfig::load(Some(file.path())).unwrap();
        assert!(!config.probe_on_start);
        assert_eq!(config.simulation.devices.len(), 2);
        assert_eq!(
            config.simulation.devices[0].objects[1],
            ObjectIdentifier::new(ObjectType::BinaryValue, 2).unwrap()
        );
        assert!(config.simulation.devices[1].null_padding);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            DiscoveryConfig::load(Some(&missing)),
            Err(DiscoveryError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = DiscoveryConfig {
            discovery_interval: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.discovery_interval = 30;
        config.who_is_low_limit = Some(10);
        assert!(config.validate().is_err());

        config.who_is_high_limit = Some(5);
        assert!(config.validate().is_err());

        config.who_is_high_limit = Some(ObjectIdentifier::MAX_INSTANCE + 1);
        assert!(config.validate().is_err());

        config.who_is_high_limit = Some(20);
        assert!(config.validate().is_ok());

        config.local_device.max_apdu_length_accepted = 10;
        assert!(config.validate().is_err());
        config.local_device.max_apdu_length_accepted = 480;

        config.simulation.devices = vec![
            SimulatedDevice::new(1, "10.0.0.1:47808"),
            SimulatedDevice::new(1, "10.0.0.2:47808"),
        ];
        assert!(config.validate().is_err());

        config.simulation.devices = vec![SimulatedDevice::new(5_000_000, "10.0.0.1:47808")];
        assert!(matches!(config.validate(), Err(DiscoveryError::Config(_))));
        config.simulation.devices = vec![SimulatedDevice::new(ObjectIdentifier::MAX_INSTANCE, "10.0.0.1:47808")];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_type_is_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "discovery_interval = \"soon\"")?;
            assert!(matches!(DiscoveryConfig::load(None), Err(DiscoveryError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = DiscoveryConfig::default();
        config.simulation.devices = SimulatedDevice::demo_fleet(2);

        let text = config.to_toml_string().unwrap();
        let back: DiscoveryConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
