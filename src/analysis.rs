//! Combined-table points and hourly resampling

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};

use crate::storage::data::Reading;

/// One point of the combined table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
}

impl Sample {
    pub fn from_reading(reading: &Reading) -> Option<Self> {
        Some(Sample {
            timestamp: reading.timestamp()?,
            temperature: reading.temperature,
            humidity: reading.humidity,
        })
    }
}

fn floor_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Average samples into one-hour buckets.
///
/// Produces one sample per non-empty bucket, stamped with the start of the
/// hour and ordered by time. Input order doesn't matter.
pub fn resample_hourly(samples: &[Sample]) -> Vec<Sample> {
    let mut buckets: BTreeMap<NaiveDateTime, (f64, f64, usize)> = BTreeMap::new();
    for sample in samples {
        let bucket = buckets.entry(floor_to_hour(sample.timestamp)).or_insert((0.0, 0.0, 0));
        bucket.0 += sample.temperature;
        bucket.1 += sample.humidity;
        bucket.2 += 1;
    }

    buckets
        .into_iter()
        .map(|(timestamp, (temperature, humidity, n))| Sample {
            timestamp,
            temperature: temperature / n as f64,
            humidity: humidity / n as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(hour, minute, second).unwrap()
    }

    fn sample(ts: NaiveDateTime, temperature: f64, humidity: f64) -> Sample {
        Sample { timestamp: ts, temperature, humidity }
    }

    #[test]
    fn test_one_row_per_hour_bucket() {
        let input = vec![
            sample(at(1, 10, 0, 0), 20.0, 50.0),
            sample(at(1, 10, 30, 0), 22.0, 54.0),
            sample(at(1, 10, 59, 59), 24.0, 58.0),
            sample(at(1, 11, 0, 0), 30.0, 40.0),
            sample(at(2, 10, 15, 0), 10.0, 90.0),
            sample(at(2, 10, 45, 0), 12.0, 80.0),
        ];
        let out = resample_hourly(&input);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], sample(at(1, 10, 0, 0), 22.0, 54.0));
        assert_eq!(out[1], sample(at(1, 11, 0, 0), 30.0, 40.0));
        assert_eq!(out[2], sample(at(2, 10, 0, 0), 11.0, 85.0));
    }

    #[test]
    fn test_unsorted_input_and_empty_hours() {
        let input = vec![
            sample(at(1, 15, 5, 0), 5.0, 5.0),
            sample(at(1, 9, 5, 0), 1.0, 1.0),
            sample(at(1, 15, 55, 0), 7.0, 9.0),
        ];
        let out = resample_hourly(&input);

        // hours 10 to 14 had no samples and produce no rows
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp, at(1, 9, 0, 0));
        assert_eq!(out[1], sample(at(1, 15, 0, 0), 6.0, 7.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_hourly(&[]).is_empty());
    }

    #[test]
    fn test_sample_from_invalid_reading() {
        let reading = Reading {
            year: 2024,
            month: 2,
            day: 30,
            hour: 0,
            minute: 0,
            second: 0,
            temperature: 1.0,
            humidity: 2.0,
        };
        assert!(Sample::from_reading(&reading).is_none());
    }
}
