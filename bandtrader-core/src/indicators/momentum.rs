//! Momentum as a price ratio: close[t] / close[t-period] * 100.
//!
//! 100 means unchanged; the momentum-breakout detector keys off the
//! 100.5 / 99.5 levels of this form.
//! Lookback: period.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Momentum {
    period: usize,
    name: String,
}

impl Momentum {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Momentum period must be >= 1");
        Self {
            period,
            name: format!("momentum_{period}"),
        }
    }
}

impl Indicator for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let prices = closes(bars);
        let mut out = vec![f64::NAN; prices.len()];
        for i in self.period..prices.len() {
            let base = prices[i - self.period];
            if base > 0.0 && !prices[i].is_nan() {
                out[i] = prices[i] / base * 100.0;
            }
        }
        out
    }
}
