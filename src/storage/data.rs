use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

/// Column names of every daily file, in order
pub const HEADER: [&str; 8] = ["Year", "Month", "Day", "Hour", "Minute", "Second", "Temperature", "Humidity"];

/// One sensor sample as stored in a daily file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reading {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Day")]
    pub day: u32,
    #[serde(rename = "Hour")]
    pub hour: u32,
    #[serde(rename = "Minute")]
    pub minute: u32,
    #[serde(rename = "Second")]
    pub second: u32,
    #[serde(rename = "Temperature")]
    pub temperature: f64, // degrees Celsius
    #[serde(rename = "Humidity")]
    pub humidity: f64, // relative, percent
}

impl Reading {
    /// None when the six time fields don't name a real instant
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?.and_hms_opt(self.hour, self.minute, self.second)
    }
}

/// One accepted line of serial output, fields kept exactly as received
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub date: NaiveDate,
    pub fields: Vec<String>,
}

impl RawRecord {
    /// Accept a line only if it has exactly eight comma separated fields
    /// and the first three form a calendar date.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != HEADER.len() {
            return None;
        }

        let year = fields[0].trim().parse::<i32>().ok()?;
        let month = fields[1].trim().parse::<u32>().ok()?;
        let day = fields[2].trim().parse::<u32>().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        Some(RawRecord {
            date,
            fields: fields.into_iter().map(str::to_string).collect(),
        })
    }
}

/// Zero padded `YYYY-MM-DD` key naming a daily file
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
