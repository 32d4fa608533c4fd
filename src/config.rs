use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::devices::SerialSettings;
use crate::plot::ChartTarget;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Logger configuration, loaded from an optional JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub data_dir: PathBuf,           // holds the daily files and logs/
    pub baud_rate: u32,
    pub read_timeout_ms: u64,        // per serial read
    pub settle_delay_ms: u64,        // wait after opening the port
    pub transmission_deadline_ms: u64,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            baud_rate: 9600,
            read_timeout_ms: 10_000,
            settle_delay_ms: 2_000,
            transmission_deadline_ms: 60_000,
            chart_width: 1000,
            chart_height: 600,
        }
    }
}

impl LoggerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            transmission_deadline: Duration::from_millis(self.transmission_deadline_ms),
        }
    }

    pub fn chart_target(&self, path: impl Into<PathBuf>) -> ChartTarget {
        ChartTarget {
            path: path.into(),
            width: self.chart_width,
            height: self.chart_height,
        }
    }
}
