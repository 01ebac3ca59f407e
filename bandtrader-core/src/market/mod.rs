//! Market data port.
//!
//! The engine reads every price and indicator series through `MarketData`.
//! Indicators are attached once at engine start (a failure there is fatal);
//! after that, reads never error. A read returns at most `count` values,
//! most recent first, and may return fewer when history is short or the
//! backend has nothing to give. Callers treat a short read as "no data" and
//! fall back to their neutral default.

pub mod replay;
pub mod snapshot;

pub use replay::{resample, ReplayFeed};
pub use snapshot::SnapshotFeed;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Timeframe;

/// Indicator definition passed to `MarketData::attach`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndicatorSpec {
    Bands { period: usize, deviation: f64 },
    Rsi { period: usize },
    Momentum { period: usize },
    Ema { period: usize, timeframe: Timeframe },
    Atr { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Stochastic { k_period: usize, d_period: usize, slowing: usize },
}

/// Indicator family, without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    Bands,
    Rsi,
    Momentum,
    Ema,
    Atr,
    Macd,
    Stochastic,
}

impl IndicatorSpec {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorSpec::Bands { .. } => IndicatorKind::Bands,
            IndicatorSpec::Rsi { .. } => IndicatorKind::Rsi,
            IndicatorSpec::Momentum { .. } => IndicatorKind::Momentum,
            IndicatorSpec::Ema { .. } => IndicatorKind::Ema,
            IndicatorSpec::Atr { .. } => IndicatorKind::Atr,
            IndicatorSpec::Macd { .. } => IndicatorKind::Macd,
            IndicatorSpec::Stochastic { .. } => IndicatorKind::Stochastic,
        }
    }
}

/// Output line of an indicator. Single-line indicators expose `Main`;
/// Stochastic exposes %K as `Main` and %D as `Signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Buffer {
    Main,
    Signal,
    Histogram,
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

/// Opaque handle returned by `attach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorHandle(pub usize);

#[derive(Debug, Error, PartialEq)]
pub enum MarketDataError {
    #[error("timeframe {requested} is finer than the feed timeframe {base}")]
    UnsupportedTimeframe { requested: Timeframe, base: Timeframe },

    #[error("invalid indicator parameters: {0}")]
    InvalidParameters(String),

    #[error("indicator {0:?} is not available from this feed")]
    Unavailable(IndicatorKind),
}

/// Source of recency-ordered price and indicator series for one symbol and timeframe.
pub trait MarketData {
    /// Acquire an indicator handle. Called at engine start only.
    fn attach(&mut self, spec: &IndicatorSpec) -> Result<IndicatorHandle, MarketDataError>;

    /// Up to `count` values of one indicator line, index 0 = current bar.
    fn indicator(&self, handle: IndicatorHandle, buffer: Buffer, count: usize) -> Vec<f64>;

    /// Up to `count` prices, index 0 = current bar.
    fn prices(&self, field: PriceField, count: usize) -> Vec<f64>;

    /// Up to `count` tick-volume samples, index 0 = current bar.
    fn tick_volume(&self, count: usize) -> Vec<f64>;
}

/// "Result or default" contract for series reads: `Some` only when the
/// adapter delivered every requested value.
pub fn require(series: Vec<f64>, count: usize) -> Option<Vec<f64>> {
    (series.len() >= count).then_some(series)
}

/// Reverse a chronological series ending at `end` (inclusive) into a
/// recency-ordered window of at most `count` values, stopping at the first NaN.
pub(crate) fn recent_window(series: &[f64], end: usize, count: usize) -> Vec<f64> {
    if series.is_empty() || end >= series.len() {
        return Vec::new();
    }
    series[..=end]
        .iter()
        .rev()
        .take(count)
        .take_while(|v| !v.is_nan())
        .copied()
        .collect()
}

pub(crate) fn validate_spec(spec: &IndicatorSpec) -> Result<(), MarketDataError> {
    let bad = |msg: &str| Err(MarketDataError::InvalidParameters(msg.to_string()));
    match *spec {
        IndicatorSpec::Bands { period, deviation } => {
            if period == 0 || !(deviation > 0.0 && deviation.is_finite()) {
                return bad("bands need period >= 1 and a positive deviation");
            }
        }
        IndicatorSpec::Rsi { period }
        | IndicatorSpec::Momentum { period }
        | IndicatorSpec::Ema { period, .. }
        | IndicatorSpec::Atr { period } => {
            if period == 0 {
                return bad("period must be >= 1");
            }
        }
        IndicatorSpec::Macd { fast, slow, signal } => {
            if fast == 0 || signal == 0 || slow <= fast {
                return bad("macd needs fast >= 1, signal >= 1 and slow > fast");
            }
        }
        IndicatorSpec::Stochastic { k_period, d_period, slowing } => {
            if k_period == 0 || d_period == 0 || slowing == 0 {
                return bad("stochastic periods must be >= 1");
            }
        }
    }
    Ok(())
}
