//! Relative Strength Index with Wilder smoothing.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). Flat price → 50.
//! Lookback: period.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let prices = closes(bars);
        let n = prices.len();
        let mut out = vec![f64::NAN; n];
        if n <= self.period {
            return out;
        }

        let change = |i: usize| prices[i] - prices[i - 1];

        let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
        for i in 1..=self.period {
            let ch = change(i);
            if ch.is_nan() {
                return out;
            }
            avg_gain += ch.max(0.0);
            avg_loss += (-ch).max(0.0);
        }
        avg_gain /= self.period as f64;
        avg_loss /= self.period as f64;
        out[self.period] = rsi_from_averages(avg_gain, avg_loss);

        let p = self.period as f64;
        for i in (self.period + 1)..n {
            let ch = change(i);
            if ch.is_nan() {
                break;
            }
            avg_gain = (avg_gain * (p - 1.0) + ch.max(0.0)) / p;
            avg_loss = (avg_loss * (p - 1.0) + (-ch).max(0.0)) / p;
            out[i] = rsi_from_averages(avg_gain, avg_loss);
        }
        out
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    match (avg_gain == 0.0, avg_loss == 0.0) {
        (true, true) => 50.0,
        (_, true) => 100.0,
        (true, _) => 0.0,
        _ => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
    }
}
