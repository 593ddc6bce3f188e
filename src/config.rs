use std::path::PathBuf;

use serde_derive::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub device: Option<DeviceConfig>,
    pub sensor: Option<SensorConfig>,
    pub store: Option<StoreConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub publisher_id: Option<String>,
    pub topic_path: Option<String>,
    pub keep_alive_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct DeviceConfig {
    pub room_name: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

/// Which presence source feeds the bridge.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SensorConfig {
    Simulated {
        toggle_seconds: Option<u64>,
    },
    /// LD2410C `OUT` pin exposed as a sysfs-style value file.
    Gpio {
        path: PathBuf,
        active_low: Option<bool>,
    },
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig::Simulated {
            toggle_seconds: None,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        let config_str = r#"
            [mqtt]
            host = "localhost"
            port = 1883
            username = "user"
            password = "pass"

            [device]
            room_name = "Kitchen"
            poll_interval_ms = 250

            [sensor]
            kind = "gpio"
            path = "/sys/class/gpio/gpio17/value"
            active_low = true

            [store]
            path = "/var/lib/occupancy"
        "#;
        let config: AppConfig = toml::de::from_str(config_str).unwrap();
        assert!(config.mqtt.host == "localhost");
        assert_eq!(
            config.device.as_ref().and_then(|d| d.room_name.as_deref()),
            Some("Kitchen")
        );
        assert_eq!(config.device.and_then(|d| d.poll_interval_ms), Some(250));
        assert_eq!(
            config.sensor,
            Some(SensorConfig::Gpio {
                path: PathBuf::from("/sys/class/gpio/gpio17/value"),
                active_low: Some(true),
            })
        );
        assert_eq!(
            config.store.and_then(|s| s.path),
            Some(PathBuf::from("/var/lib/occupancy"))
        );
    }

    #[test]
    fn test_minimal_config() {
        let config: AppConfig = toml::de::from_str("[mqtt]\nhost = \"broker\"\n").unwrap();
        assert!(config.device.is_none());
        assert!(config.store.is_none());
        assert_eq!(
            config.sensor.unwrap_or_default(),
            SensorConfig::Simulated {
                toggle_seconds: None
            }
        );
    }

    #[test]
    fn test_simulated_sensor_config() {
        let config_str = r#"
            [mqtt]
            host = "broker"

            [sensor]
            kind = "simulated"
            toggle_seconds = 2
        "#;
        let config: AppConfig = toml::de::from_str(config_str).unwrap();
        assert_eq!(
            config.sensor,
            Some(SensorConfig::Simulated {
                toggle_seconds: Some(2)
            })
        );
    }

    #[test]
    fn test_unknown_sensor_kind_rejected() {
        let config_str = r#"
            [mqtt]
            host = "broker"

            [sensor]
            kind = "uart"
        "#;
        assert!(toml::de::from_str::<AppConfig>(config_str).is_err());
    }
}
