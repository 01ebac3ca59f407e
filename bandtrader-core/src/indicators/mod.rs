//! Causal indicator implementations.
//!
//! The engine never computes indicators itself; these back the replay
//! adapter, which precomputes each attached series once over the bar history
//! and serves recency-ordered windows from it.
//!
//! Multi-output indicators (Bollinger, MACD, Stochastic) are exposed as one
//! instance per output line, keeping the single-series `Indicator` trait.
//! Series are chronological (index 0 = oldest) and warmup slots hold NaN.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod momentum;
pub mod rsi;
pub mod sma;
pub mod stochastic;

pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::Ema;
pub use macd::{Macd, MacdLine};
pub use momentum::Momentum;
pub use rsi::Rsi;
pub use sma::Sma;
pub use stochastic::{Stochastic, StochasticLine};

use crate::domain::Bar;

/// A pure function from bar history to a numeric series of the same length.
///
/// # Look-ahead contamination guard
/// No value at bar t may depend on bars after t. The replay adapter relies
/// on this to precompute over the whole history.
pub trait Indicator: Send + Sync {
    /// Stable name (e.g., "rsi_14", "bands_upper_20_2").
    fn name(&self) -> &str;

    /// Number of leading NaN slots.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Close prices of a bar slice.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Rolling arithmetic mean over `period` values. NaN inside a window yields NaN.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Build hourly synthetic bars from close prices for testing.
///
/// open = previous close, high/low = max/min(open, close) +/- 0.5,
/// tick_volume = 100.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                start + Duration::hours(i as i64),
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                100,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_of_series_basic() {
        let out = sma_of_series(&[1.0, 2.0, 3.0, 4.0], 2);
        assert!(out[0].is_nan());
        assert_approx(out[1], 1.5, DEFAULT_EPSILON);
        assert_approx(out[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_of_series_skips_nan_windows() {
        let out = sma_of_series(&[1.0, f64::NAN, 3.0, 4.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_approx(out[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn closes_extracts_close() {
        let bars = make_bars(&[1.0, 2.0]);
        assert_eq!(closes(&bars), vec![1.0, 2.0]);
    }
}
