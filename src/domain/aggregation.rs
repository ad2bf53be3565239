use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use thiserror::Error;

use crate::domain::models::{DeviceEvent, EventType};

pub const DAY_BUCKETS: usize = 48;
pub const YEAR_BUCKETS: usize = 12;

/// Histogram counts per device, keyed by device id.
pub type BucketMap = BTreeMap<i64, Vec<u32>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Day,
    Month,
    Year,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("interval must be one of day, month, year")]
    UnknownInterval(String),
    #[error("reference date {0} has no representable aggregation window")]
    DateOutOfRange(NaiveDate),
}

impl FromStr for Interval {
    type Err = AggregationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(AggregationError::UnknownInterval(other.to_string())),
        }
    }
}

/// Half-open `[start, end)` range of event timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        *timestamp >= self.start && *timestamp < self.end
    }
}

impl Interval {
    pub fn window(self, reference: NaiveDate) -> Result<TimeWindow, AggregationError> {
        let (start, end) = match self {
            Self::Day => (Some(reference), reference.succ_opt()),
            Self::Month => {
                let start = reference.with_day(1);
                let end = if reference.month() == 12 {
                    NaiveDate::from_ymd_opt(reference.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(reference.year(), reference.month() + 1, 1)
                };
                (start, end)
            }
            Self::Year => (
                NaiveDate::from_ymd_opt(reference.year(), 1, 1),
                NaiveDate::from_ymd_opt(reference.year() + 1, 1, 1),
            ),
        };

        match (start, end) {
            (Some(start), Some(end)) => Ok(TimeWindow {
                start: start.and_time(NaiveTime::MIN),
                end: end.and_time(NaiveTime::MIN),
            }),
            _ => Err(AggregationError::DateOutOfRange(reference)),
        }
    }

    pub fn bucket_count(self, reference: NaiveDate) -> Result<usize, AggregationError> {
        match self {
            Self::Day => Ok(DAY_BUCKETS),
            Self::Year => Ok(YEAR_BUCKETS),
            Self::Month => {
                let window = self.window(reference)?;
                let days = (window.end.date() - window.start.date()).num_days();
                usize::try_from(days).map_err(|_| AggregationError::DateOutOfRange(reference))
            }
        }
    }

    /// Bucket slot of a timestamp inside this interval's window.
    ///
    /// The day formula divides minute-of-day by the bucket count rather than by
    /// the 30 minute bucket width, so it only ever yields 0..=29 and slots
    /// 30..=47 stay empty. Frontends chart against this layout, keep it.
    pub fn bucket_index(self, timestamp: &NaiveDateTime) -> usize {
        match self {
            Self::Day => {
                let minute_of_day = timestamp.hour() * 60 + timestamp.minute();
                (minute_of_day / DAY_BUCKETS as u32) as usize
            }
            Self::Month => timestamp.day0() as usize,
            Self::Year => timestamp.month0() as usize,
        }
    }
}

/// Rolls entry events into fixed-length per-device histograms.
///
/// Rows are expected to be pre-filtered to `interval.window(reference)`. Any
/// row that still lands outside the bucket range is skipped. Every device with
/// an in-range row gets an array, but only `entry` rows increment it.
pub fn bucketize(
    rows: &[DeviceEvent],
    interval: Interval,
    reference: NaiveDate,
) -> Result<BucketMap, AggregationError> {
    let bucket_count = interval.bucket_count(reference)?;
    let mut buckets = BucketMap::new();

    for row in rows {
        let index = interval.bucket_index(&row.created_at);
        if index >= bucket_count {
            continue;
        }

        let counts = buckets
            .entry(row.device_id)
            .or_insert_with(|| vec![0; bucket_count]);

        if row.event_type == EventType::Entry {
            counts[index] += 1;
        }
    }

    Ok(buckets)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceCount {
    pub device_id: i64,
    pub entries: u32,
    pub exits: u32,
}

pub fn count_today(rows: &[DeviceEvent], device_id: i64) -> DeviceCount {
    let mut count = DeviceCount {
        device_id,
        entries: 0,
        exits: 0,
    };

    for row in rows.iter().filter(|row| row.device_id == device_id) {
        match row.event_type {
            EventType::Entry => count.entries += 1,
            EventType::Exit => count.exits += 1,
            EventType::Other(_) => {}
        }
    }

    count
}
