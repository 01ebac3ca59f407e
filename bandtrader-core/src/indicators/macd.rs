//! MACD: fast EMA minus slow EMA, with an SMA signal line.
//!
//! main = EMA(fast) - EMA(slow); signal = SMA(main, signal_period);
//! histogram = main - signal.

use super::ema::ema_of_series;
use super::{closes, sma_of_series, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Main,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(slow > fast, "MACD slow period must exceed fast period");
        let label = match line {
            MacdLine::Main => "main",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }

    fn main_line(&self, bars: &[Bar]) -> Vec<f64> {
        let prices = closes(bars);
        let fast = ema_of_series(&prices, self.fast);
        let slow = ema_of_series(&prices, self.slow);
        fast.iter().zip(&slow).map(|(f, s)| f - s).collect()
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            MacdLine::Main => self.slow - 1,
            MacdLine::Signal | MacdLine::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let main = self.main_line(bars);
        if self.line == MacdLine::Main {
            return main;
        }

        // Skip the NaN warmup so the SMA windows start at the first valid main value.
        let first = main.iter().position(|v| !v.is_nan()).unwrap_or(main.len());
        let mut signal = vec![f64::NAN; main.len()];
        let tail = sma_of_series(&main[first..], self.signal);
        signal[first..].copy_from_slice(&tail);

        match self.line {
            MacdLine::Signal => signal,
            _ => main.iter().zip(&signal).map(|(m, s)| m - s).collect(),
        }
    }
}
