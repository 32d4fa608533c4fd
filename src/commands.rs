//! One handler per user action. Each runs to completion and returns a value
//! or error for the shell to report; nothing is kept between calls.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{error, info};

use crate::config::{ConfigError, LoggerConfig};
use crate::devices::{ArduinoError, PortEntry, arduino};
use crate::plot::{self, Period, PlotError, RenderedChart};
use crate::storage::{self, StorageError, WriteSummary};

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("No serial port selected")]
    MissingPort,

    #[error("Communication with the Arduino failed: {0}")]
    Communication(#[from] ArduinoError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Plot error: {0}")]
    Plot(#[from] PlotError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CommandError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, CommandError::Plot(PlotError::NoData(_)))
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            CommandError::MissingPort => "Proszę wybrać port USB.".to_string(),
            CommandError::Communication(e) => format!("Nie udało się nawiązać komunikacji z Arduino: {}", e),
            CommandError::Storage(e) => format!("Nie udało się zapisać danych: {}", e),
            CommandError::Plot(PlotError::NoData(_)) => "Brak dostępnych danych dla wybranego okresu czasu.".to_string(),
            CommandError::Plot(e) => format!("Błąd podczas wyświetlania wykresu: {}", e),
            CommandError::Config(e) => format!("Błąd konfiguracji: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Available serial ports
pub fn ports() -> Result<Vec<PortEntry>> {
    Ok(arduino::list_ports()?)
}

/// Poll the board on `port` and append what it sends to the daily files
pub fn fetch(config: &LoggerConfig, port: &str) -> Result<WriteSummary> {
    let port = port.trim();
    if port.is_empty() {
        return Err(CommandError::MissingPort);
    }

    info!("Fetching readings from {}", port);
    let raw = arduino::fetch_from_port(port, config.serial_settings()).map_err(|e| {
        error!("Fetching from {} failed: {}", port, e);
        CommandError::Communication(e)
    })?;

    store_transmission(&config.data_dir, &raw)
}

/// Persist one transmission. An empty transmission writes nothing.
pub fn store_transmission(data_dir: &Path, raw: &str) -> Result<WriteSummary> {
    if raw.trim().is_empty() {
        info!("Arduino sent no readings");
        return Ok(WriteSummary::default());
    }
    let summary = storage::save_readings(data_dir, raw)?;
    info!(
        "Stored {} readings in {} daily files ({} lines discarded)",
        summary.total_rows(),
        summary.files.len(),
        summary.discarded
    );
    Ok(summary)
}

/// Dates that have data
pub fn dates(config: &LoggerConfig) -> Result<BTreeSet<NaiveDate>> {
    Ok(storage::list_dates(&config.data_dir)?)
}

/// Render the chart for `period` to `output`
pub fn plot(config: &LoggerConfig, period: Period, output: &Path, now: NaiveDateTime) -> Result<RenderedChart> {
    let target = config.chart_target(output);
    Ok(plot::plot_period(&config.data_dir, period, &target, now)?)
}
