//! Sensor topology configuration (`sensors.json`).
//!
//! The document is authored by an operator or generated by the discovery
//! scan, and is immutable for the life of the process. Validation happens
//! once at startup; a malformed document is fatal before any hardware or
//! network resource is acquired.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default config path on a deployed node.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sensors.json";

fn default_i2c_bus() -> u8 {
    1
}

/// Broker coordinates for the publisher adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname or IP, with an optional `:port` suffix
    /// (standard port 1883 otherwise).
    pub server: String,
    /// Single topic every payload line is published to.
    pub topic: String,
}

/// The supported sensor families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    #[serde(rename = "DS18B20")]
    Ds18b20,
    #[serde(rename = "SI7021")]
    Si7021,
    #[serde(rename = "HTU21")]
    Htu21,
    #[serde(rename = "BME280")]
    Bme280,
}

impl SensorKind {
    /// Wire name, used in both payload lines and the config document.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ds18b20 => "DS18B20",
            Self::Si7021 => "SI7021",
            Self::Htu21 => "HTU21",
            Self::Bme280 => "BME280",
        }
    }

    /// Whether readings go through the I2C register bus.
    pub fn needs_i2c(self) -> bool {
        !matches!(self, Self::Ds18b20)
    }

    /// Measurands this family produces, in driver output order.
    pub fn default_measurands(self) -> &'static [&'static str] {
        match self {
            Self::Ds18b20 => &["temperature"],
            Self::Si7021 | Self::Htu21 => &["temperature", "humidity"],
            Self::Bme280 => &["temperature", "humidity", "pressure"],
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A sensor is addressed either by a 7-bit bus address (I2C families) or
/// by its 1-Wire device directory name (e.g. `28-0316a2c91d1b`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorId {
    Address(u8),
    Device(String),
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(a) => write!(f, "0x{a:02x}"),
            Self::Device(d) => f.write_str(d),
        }
    }
}

/// One named physical quantity with its additive calibration offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurand {
    pub measurand: String,
    #[serde(default)]
    pub correction: f64,
}

/// A configured or discovered measurement source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    #[serde(rename = "sensor")]
    pub kind: SensorKind,
    /// 0/1 in the document, kept as the integer for config compatibility.
    pub enabled: u8,
    pub location: String,
    /// Multiplexer channel index (0–7), present only on multiplexed buses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    /// Conversion settle delay override; defaults per kind when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_ms: Option<u64>,
    pub values: Vec<Measurand>,
}

impl Sensor {
    pub fn is_enabled(&self) -> bool {
        self.enabled == 1
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub mqtt: MqttConfig,
    /// Poll interval in seconds.
    pub interval: u64,
    /// Node identifier stamped into every payload line.
    pub node: String,
    /// Which /dev/i2c-N the poll loop opens when any sensor needs it.
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,
    pub sensors: Vec<Sensor>,
}

impl NodeConfig {
    /// Load and validate a config document. Any failure here is fatal to
    /// the caller; the poller never starts on a broken topology.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("config file \"{}\" not readable", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&content)
            .with_context(|| format!("syntax error in config file \"{}\"", path.display()))?;

        let issues = config.validate();
        if !issues.is_empty() {
            anyhow::bail!(
                "invalid config \"{}\": {}",
                path.display(),
                issues.join("; ")
            );
        }
        Ok(config)
    }

    /// Structural checks beyond what serde enforces.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.interval == 0 {
            issues.push("interval must be a positive number of seconds".into());
        }
        if self.node.is_empty() {
            issues.push("node identifier must not be empty".into());
        }

        for sensor in &self.sensors {
            let tag = format!("sensor {} at {}", sensor.kind, sensor.location);
            if let Some(ch) = sensor.channel {
                if ch > 7 {
                    issues.push(format!("{tag}: channel {ch} out of range 0-7"));
                }
                if !sensor.kind.needs_i2c() {
                    issues.push(format!("{tag}: channel is only valid on the I2C bus"));
                }
            }
            // Readings are matched to measurands by position, so the
            // names must follow the driver's fixed output order.
            let expected = sensor.kind.default_measurands();
            if sensor.values.len() != expected.len() {
                issues.push(format!(
                    "{tag}: expected {} measurands, found {}",
                    expected.len(),
                    sensor.values.len()
                ));
            } else {
                for (value, name) in sensor.values.iter().zip(expected) {
                    if value.measurand != *name {
                        issues.push(format!(
                            "{tag}: expected measurand \"{name}\", found \"{}\"",
                            value.measurand
                        ));
                    }
                }
            }
            match (&sensor.id, sensor.kind.needs_i2c()) {
                (SensorId::Device(_), true) => {
                    issues.push(format!("{tag}: I2C sensors are addressed by bus address"));
                }
                (SensorId::Address(_), false) => {
                    issues.push(format!("{tag}: 1-Wire sensors are addressed by device id"));
                }
                _ => {}
            }
        }

        issues
    }

    /// True when at least one enabled sensor reads over I2C.
    pub fn needs_i2c(&self) -> bool {
        self.sensors
            .iter()
            .any(|s| s.is_enabled() && s.kind.needs_i2c())
    }
}
