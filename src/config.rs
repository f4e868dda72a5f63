//! Bridge configuration: environment variables plus a JSON devices file.
//!
//! `DEVICES_FILE` (default `devices.json`) holds an array of devices:
//!
//! ```json
//! [{ "host": "lights.local", "port": 81, "name": "Hallway", "pins": ["a", "b"] }]
//! ```
//!
//! `RETRY_ATTEMPTS` / `RETRY_INTERVAL_SECS` set the bounded reconnect
//! schedule (defaults 3 × 30 s).

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::connection::{Endpoint, RetryPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub retry: RetryConfig,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub attempts: u32,
    pub interval_secs: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::Bounded {
            attempts: self.attempts,
            delay: Duration::from_secs(self.interval_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Pin names, normalized to lowercase — the firmware keys
    /// `lightState` by lowercase pin name.
    pub pins: Vec<String>,
}

impl DeviceConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

// Serde structs for parsing the devices file
#[derive(Deserialize)]
struct RawDevice {
    host: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pins: Vec<String>,
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let devices_file = env_or_default("DEVICES_FILE", "devices.json".to_string());
        let devices = load_devices(&devices_file)?;

        let config = Self {
            retry: RetryConfig {
                attempts: env_or_default("RETRY_ATTEMPTS", 3),
                interval_secs: env_or_default("RETRY_INTERVAL_SECS", 30),
            },
            devices,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.devices.is_empty() {
            return Err("No devices found in devices file".into());
        }
        for device in &self.devices {
            if device.host.is_empty() {
                return Err(format!("Device {} has an empty host", device.name));
            }
            if device.pins.is_empty() {
                return Err(format!(
                    "Device {} has no pins; the bridge needs at least one",
                    device.name
                ));
            }
        }
        if self.retry.attempts == 0 {
            return Err("RETRY_ATTEMPTS must be > 0".into());
        }
        if self.retry.interval_secs == 0 {
            return Err("RETRY_INTERVAL_SECS must be > 0".into());
        }
        Ok(())
    }
}

fn load_devices(path: &str) -> Result<Vec<DeviceConfig>, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
    parse_devices(&content).map_err(|e| format!("Failed to parse {path}: {e}"))
}

fn parse_devices(content: &str) -> Result<Vec<DeviceConfig>, serde_json::Error> {
    let raw_devices: Vec<RawDevice> = serde_json::from_str(content)?;

    Ok(raw_devices
        .into_iter()
        .map(|raw| {
            let name = raw.name.unwrap_or_else(|| raw.host.clone());
            DeviceConfig {
                name,
                port: raw.port.unwrap_or(Endpoint::DEFAULT_PORT),
                pins: raw.pins.iter().map(|p| p.to_lowercase()).collect(),
                host: raw.host,
            }
        })
        .collect())
}
