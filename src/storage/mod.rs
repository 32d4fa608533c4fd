pub mod data;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use thiserror::Error;
use tracing::{debug, info, warn};

use data::{HEADER, RawRecord, Reading, date_key};

const FILE_PREFIX: &str = "data_";
const FILE_EXTENSION: &str = ".csv";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Rows appended to one daily file
#[derive(Debug, Clone, PartialEq)]
pub struct DailyWrite {
    pub date: NaiveDate,
    pub path: PathBuf,
    pub rows: usize,
}

/// Outcome of persisting one serial transmission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSummary {
    pub files: Vec<DailyWrite>,
    pub discarded: usize,
}

impl WriteSummary {
    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }
}

pub fn daily_file_name(date: NaiveDate) -> String {
    format!("{}{}{}", FILE_PREFIX, date_key(date), FILE_EXTENSION)
}

pub fn daily_file_path(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(daily_file_name(date))
}

/// Split a transmission into records grouped by calendar date.
///
/// Returns the groups and the number of non-empty lines that were dropped.
pub fn group_by_date(raw: &str) -> (BTreeMap<NaiveDate, Vec<RawRecord>>, usize) {
    let mut daily: BTreeMap<NaiveDate, Vec<RawRecord>> = BTreeMap::new();
    let mut discarded = 0;

    for line in raw.lines() {
        match RawRecord::parse(line) {
            Some(record) => daily.entry(record.date).or_default().push(record),
            None => {
                if !line.trim().is_empty() {
                    debug!("Discarding malformed line: {:?}", line);
                    discarded += 1;
                }
            }
        }
    }

    (daily, discarded)
}

/// Append every well formed line of `raw` to the daily file of its date.
///
/// A daily file gets its header when it is created (or found empty) and is
/// only ever appended to afterwards. Repeated rows are written again.
pub fn save_readings(root: &Path, raw: &str) -> Result<WriteSummary> {
    let (daily, discarded) = group_by_date(raw);
    if discarded > 0 {
        warn!("Discarded {} malformed lines", discarded);
    }
    if daily.is_empty() {
        return Ok(WriteSummary { files: Vec::new(), discarded });
    }

    std::fs::create_dir_all(root)?;

    let mut files = Vec::with_capacity(daily.len());
    for (date, records) in daily {
        let path = daily_file_path(root, date);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
        }
        for record in &records {
            writer.write_record(&record.fields)?;
        }
        writer.flush()?;

        info!("Appended {} rows to {}", records.len(), path.display());
        files.push(DailyWrite { date, path, rows: records.len() });
    }

    Ok(WriteSummary { files, discarded })
}

/// Dates that already have a daily file under `root`
pub fn list_dates(root: &Path) -> Result<BTreeSet<NaiveDate>> {
    let mut dates = BTreeSet::new();
    if !root.is_dir() {
        debug!("Storage root {} does not exist yet", root.display());
        return Ok(dates);
    }

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(key) = name.strip_prefix(FILE_PREFIX).and_then(|n| n.strip_suffix(FILE_EXTENSION)) else {
            continue;
        };
        match NaiveDate::parse_from_str(key, "%Y-%m-%d") {
            Ok(date) => {
                dates.insert(date);
            }
            Err(_) => debug!("Ignoring {}: not a daily file name", name),
        }
    }

    Ok(dates)
}

/// Read every row of a daily file, skipping rows that don't deserialize
pub fn load_daily_file(path: &Path) -> Result<Vec<Reading>> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut readings = Vec::new();
    for (i, row) in reader.deserialize::<Reading>().enumerate() {
        match row {
            Ok(reading) => readings.push(reading),
            Err(e) => warn!("Skipping row {} of {}: {}", i + 1, path.display(), e),
        }
    }
    debug!("Loaded {} readings from {}", readings.len(), path.display());
    Ok(readings)
}
