//! CSV bar loading.
//!
//! Expected header: `timestamp,open,high,low,close,tick_volume`. Timestamps
//! may be RFC 3339, `YYYY-MM-DD HH:MM[:SS]` or the `YYYY.MM.DD HH:MM[:SS]`
//! terminal export format, all read as UTC.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::DataError;
use crate::domain::Bar;

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    tick_volume: u64,
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_bars(file)
}

/// Parse and validate chronological bars from any CSV reader.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars: Vec<Bar> = Vec::new();
    for (idx, record) in csv_reader.deserialize::<BarRow>().enumerate() {
        // 1-based data row, header excluded
        let row = idx + 1;
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| DataError::Timestamp {
            row,
            value: record.timestamp.clone(),
        })?;
        let bar = Bar::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.tick_volume,
        );
        if !bar.is_sane() {
            return Err(DataError::InsaneBar { row });
        }
        if bars.last().is_some_and(|prev| prev.timestamp >= bar.timestamp) {
            return Err(DataError::OutOfOrder { row });
        }
        bars.push(bar);
    }
    Ok(bars)
}
