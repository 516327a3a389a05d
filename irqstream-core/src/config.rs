// SPDX-License-Identifier: Apache-2.0

//! YAML configuration parser with strict schema validation.
//!
//! Front ends load an optional `irqstream.yaml`; every field has a default,
//! so an absent file yields the default configuration, but any field that is
//! present and invalid refuses startup with a ConfigError.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default transport path: the device node the privileged producer registers.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/rp1_gpio_irq";

/// Default bounded-wait timeout for the drain loop. Bounds shutdown latency
/// to one timeout period.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Default capacity of the downstream decoupling queue used by front ends.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_device_path")]
    device_path: String,
    #[serde(default = "default_poll_timeout_ms")]
    poll_timeout_ms: u64,
    #[serde(default = "default_realtime")]
    realtime: bool,
    #[serde(default)]
    pin_cpu: Option<usize>,
    #[serde(default = "default_queue_depth")]
    queue_depth: usize,
}

fn default_device_path() -> String {
    DEFAULT_DEVICE_PATH.to_string()
}

fn default_poll_timeout_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT.as_millis() as u64
}

fn default_realtime() -> bool {
    true
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            device_path: default_device_path(),
            poll_timeout_ms: default_poll_timeout_ms(),
            realtime: default_realtime(),
            pin_cpu: None,
            queue_depth: default_queue_depth(),
        }
    }
}

/// Validated listener configuration, consumed by `IrqListener`.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Device node to open and map.
    pub device_path: PathBuf,
    /// Bounded readiness-wait timeout; also the shutdown-latency bound.
    pub poll_timeout: Duration,
    /// Attempt SCHED_FIFO promotion of the drain thread.
    pub realtime: bool,
    /// Pin the drain thread to this CPU, if set.
    pub pin_cpu: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            realtime: true,
            pin_cpu: None,
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub listener: ListenerConfig,
    /// Capacity of the downstream decoupling queue (power of two).
    pub queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        RawConfig::default()
            .validate()
            .expect("default configuration must validate")
    }
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        if self.device_path.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "device_path",
                value: self.device_path,
                reason: "device path cannot be empty".to_string(),
            });
        }
        if !self.device_path.starts_with('/') {
            return Err(ConfigError::InvalidFieldValue {
                field: "device_path",
                value: self.device_path,
                reason: "device path must be absolute".to_string(),
            });
        }

        if self.poll_timeout_ms == 0 || self.poll_timeout_ms > 10_000 {
            return Err(ConfigError::InvalidFieldValue {
                field: "poll_timeout_ms",
                value: self.poll_timeout_ms.to_string(),
                reason: "must be between 1 and 10000 (the timeout bounds shutdown latency)"
                    .to_string(),
            });
        }

        if let Some(cpu) = self.pin_cpu {
            if cpu >= num_cpus::get() {
                return Err(ConfigError::InvalidFieldValue {
                    field: "pin_cpu",
                    value: cpu.to_string(),
                    reason: format!("only {} CPUs available", num_cpus::get()),
                });
            }
        }

        if !self.queue_depth.is_power_of_two() || self.queue_depth < 2 {
            return Err(ConfigError::InvalidFieldValue {
                field: "queue_depth",
                value: self.queue_depth.to_string(),
                reason: "must be a power of two, at least 2".to_string(),
            });
        }

        Ok(Config {
            listener: ListenerConfig {
                device_path: PathBuf::from(self.device_path),
                poll_timeout: Duration::from_millis(self.poll_timeout_ms),
                realtime: self.realtime,
                pin_cpu: self.pin_cpu,
            },
            queue_depth: self.queue_depth,
        })
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;

        let raw: RawConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;

        let config = raw.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    ///
    /// Used for the default config location, where absence is normal.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_file(path)
        } else {
            tracing::debug!(path = %path.display(), "No configuration file; using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_from_str(yaml: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        raw.validate()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(
            config.listener.device_path,
            PathBuf::from(DEFAULT_DEVICE_PATH)
        );
        assert_eq!(config.listener.poll_timeout, DEFAULT_POLL_TIMEOUT);
        assert!(config.listener.realtime);
        assert_eq!(config.listener.pin_cpu, None);
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = load_from_str("device_path: /dev/custom_irq\n").expect("valid config");
        assert_eq!(config.listener.device_path, PathBuf::from("/dev/custom_irq"));
        assert_eq!(config.listener.poll_timeout, DEFAULT_POLL_TIMEOUT);
    }

    #[test]
    fn test_relative_device_path_rejected() {
        let err = load_from_str("device_path: dev/foo\n").expect_err("must reject");
        assert!(matches!(
            err,
            ConfigError::InvalidFieldValue {
                field: "device_path",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(load_from_str("poll_timeout_ms: 0\n").is_err());
        assert!(load_from_str("poll_timeout_ms: 60000\n").is_err());
    }

    #[test]
    fn test_queue_depth_must_be_power_of_two() {
        assert!(load_from_str("queue_depth: 1000\n").is_err());
        assert!(load_from_str("queue_depth: 1024\n").is_ok());
    }

    #[test]
    fn test_load_optional_missing_file_uses_defaults() {
        let config =
            ConfigLoader::load_optional("/nonexistent/irqstream.yaml").expect("defaults");
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
    }

    #[test]
    fn test_load_file_missing_is_error() {
        let err = ConfigLoader::load_file("/nonexistent/irqstream.yaml").expect_err("not found");
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
