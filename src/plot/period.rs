use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// Display window anchored at the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown period {0:?}, expected one of: Dzień, Tydzień, Miesiąc, Rok")]
pub struct ParsePeriodError(String);

impl Period {
    pub const ALL: [Period; 4] = [Period::Day, Period::Week, Period::Month, Period::Year];

    /// Label shown to the user
    pub fn label(self) -> &'static str {
        match self {
            Period::Day => "Dzień",
            Period::Week => "Tydzień",
            Period::Month => "Miesiąc",
            Period::Year => "Rok",
        }
    }

    fn lookback_days(self) -> Option<i64> {
        match self {
            Period::Day => None,
            Period::Week => Some(7),
            Period::Month => Some(30),
            Period::Year => Some(365),
        }
    }

    /// Whether samples get averaged into hourly buckets before plotting
    pub fn is_resampled(self) -> bool {
        self != Period::Day
    }

    /// The x-axis range: the whole of today for a day, otherwise the last N days up to now
    pub fn window(self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        match self.lookback_days() {
            None => {
                let start = now.date().and_time(NaiveTime::MIN);
                (start, start + Duration::days(1))
            }
            Some(days) => (now - Duration::days(days), now),
        }
    }

    /// Whether the daily file for `date` belongs to this period
    pub fn includes(self, date: NaiveDate, now: NaiveDateTime) -> bool {
        match self.lookback_days() {
            None => date == now.date(),
            Some(days) => date.and_time(NaiveTime::MIN) >= now - Duration::days(days),
        }
    }

    /// strftime pattern for x-axis tick labels
    pub fn axis_format(self) -> &'static str {
        match self {
            Period::Day => "%H:%M",
            Period::Week => "%d.%m %H:%M",
            Period::Month | Period::Year => "%d.%m.%Y",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Period::ALL
            .into_iter()
            .find(|p| {
                let english = match p {
                    Period::Day => "day",
                    Period::Week => "week",
                    Period::Month => "month",
                    Period::Year => "year",
                };
                wanted == english || wanted == p.label().to_lowercase()
            })
            .ok_or_else(|| ParsePeriodError(s.to_string()))
    }
}
