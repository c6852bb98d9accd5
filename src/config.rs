//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `station.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SamplingConfig: read/flush cadence and smoothing window.
//!     - DisplayConfig: LED matrix colors and refresh behavior.
//!     - StoreConfig: path of the shared JSON log file.
//!     - WebConfig: consumer API bind address and reader retry budget.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    pub sampling: SamplingConfig,
    pub display: DisplayConfig,
    pub store: StoreConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    /// wake period of the sampling loop, in milliseconds
    pub read_interval_ms: u64,
    /// how much history each ring buffer holds, in seconds
    pub buffer_seconds: u64,
    /// minimum gap between store appends, in milliseconds
    pub log_interval_ms: u64,
    /// number of most-recent samples averaged for display/logging
    pub smoothing_window: usize,
}

impl SamplingConfig {
    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }

    /// Ring buffer capacity: buffer_seconds worth of samples at the
    /// configured read interval.
    pub fn buffer_capacity(&self) -> usize {
        ((self.buffer_seconds * 1000) / self.read_interval_ms.max(1)) as usize
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    /// scroll text color as [r, g, b]
    pub text_color: [u8; 3],
    /// per-column scroll delay, in milliseconds
    pub scroll_speed_ms: u64,
    /// extra delay after each compass redraw, in milliseconds
    pub compass_refresh_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub bind_addr: String,
    /// attempts before the robust reader gives up and returns empty
    pub read_retries: u32,
    /// delay between reader attempts, in milliseconds
    pub retry_delay_ms: u64,
}

impl WebConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl StationConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: StationConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("station.toml"),
            PathBuf::from("..").join("config").join("station.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig {
                read_interval_ms: 10,
                buffer_seconds: 5,
                log_interval_ms: 500,
                smoothing_window: 10,
            },
            display: DisplayConfig {
                text_color: [0, 255, 0],
                scroll_speed_ms: 50,
                compass_refresh_ms: 200,
            },
            store: StoreConfig { path: PathBuf::from("sensor_data.json") },
            web: WebConfig {
                bind_addr: "0.0.0.0:3000".to_string(),
                read_retries: 5,
                retry_delay_ms: 200,
            },
            logging: LoggingConfig { level: "info".to_string() },
        }
    }
}
