//! Bar sources for replay: CSV files and seeded synthetic series.

pub mod loader;
pub mod synthetic;

pub use loader::{load_bars_csv, read_bars};
pub use synthetic::{synthetic_bars, SyntheticParams};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("read bars {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: bad timestamp {value:?}")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: inconsistent OHLC values")]
    InsaneBar { row: usize },

    #[error("row {row}: timestamp not after the previous bar")]
    OutOfOrder { row: usize },
}
