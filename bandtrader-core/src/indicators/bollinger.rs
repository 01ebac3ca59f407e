//! Bollinger Bands: SMA of closes +/- deviation * population stddev.
//!
//! One `Indicator` instance per band. Lookback: period - 1.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    deviation: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, deviation: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        assert!(
            deviation > 0.0 && deviation.is_finite(),
            "Bollinger deviation must be positive and finite"
        );
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            deviation,
            band,
            name: format!("bands_{label}_{period}_{deviation}"),
        }
    }

    pub fn upper(period: usize, deviation: f64) -> Self {
        Self::new(period, deviation, BollingerBand::Upper)
    }

    pub fn middle(period: usize, deviation: f64) -> Self {
        Self::new(period, deviation, BollingerBand::Middle)
    }

    pub fn lower(period: usize, deviation: f64) -> Self {
        Self::new(period, deviation, BollingerBand::Lower)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let prices = closes(bars);
        let mut out = vec![f64::NAN; prices.len()];
        if prices.len() < self.period {
            return out;
        }

        for (offset, window) in prices.windows(self.period).enumerate() {
            if window.iter().any(|v| v.is_nan()) {
                continue;
            }
            let mean = window.iter().sum::<f64>() / self.period as f64;
            let value = if self.band == BollingerBand::Middle {
                mean
            } else {
                let variance =
                    window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / self.period as f64;
                let width = self.deviation * variance.sqrt();
                match self.band {
                    BollingerBand::Upper => mean + width,
                    _ => mean - width,
                }
            };
            out[offset + self.period - 1] = value;
        }
        out
    }
}
