use std::fs;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub bus: BusConfig,
    pub intervals: IntervalConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IntervalConfig {
    /// Producer tick, seconds between monitoring samples.
    pub sample_seconds: u64,
    /// A full status snapshot goes out every Nth tick.
    pub status_every: u32,
    /// Listener idle backoff between poll cycles, milliseconds.
    pub poll_idle_ms: u64,
    pub connect_timeout_seconds: u64,
    pub keep_alive_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitsConfig {
    pub event_channel_size: usize,
    pub transport_queue_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub console_level: String,
    pub directory: String,
    pub file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusConfig {
                host: "localhost".to_string(),
                port: 8899,
            },
            intervals: IntervalConfig {
                sample_seconds: 2,
                status_every: 5,
                poll_idle_ms: 100,
                connect_timeout_seconds: 5,
                keep_alive_seconds: 30,
            },
            limits: LimitsConfig {
                event_channel_size: 100,
                transport_queue_size: 100,
            },
            logging: LoggingConfig {
                console_level: "info".to_string(),
                directory: "./logs".to_string(),
                file: "fleet-monitor.log".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_example(path: &str) -> Result<()> {
        let toml_content = toml::to_string_pretty(&Config::default())?;
        fs::write(path, toml_content)?;
        Ok(())
    }
}
