//! Stochastic oscillator with slowing.
//!
//! %K = 100 * sum(close - LL(k)) / sum(HH(k) - LL(k)) over `slowing` bars;
//! %D = SMA(%K, d_period). A zero range yields 50.

use super::{sma_of_series, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochasticLine {
    K,
    D,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
    slowing: usize,
    line: StochasticLine,
    name: String,
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize, slowing: usize, line: StochasticLine) -> Self {
        assert!(
            k_period >= 1 && d_period >= 1 && slowing >= 1,
            "Stochastic periods must be >= 1"
        );
        let label = match line {
            StochasticLine::K => "k",
            StochasticLine::D => "d",
        };
        Self {
            k_period,
            d_period,
            slowing,
            line,
            name: format!("stoch_{label}_{k_period}_{d_period}_{slowing}"),
        }
    }

    fn k_line(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut num = vec![f64::NAN; n];
        let mut den = vec![f64::NAN; n];
        for i in (self.k_period - 1)..n {
            let window = &bars[i + 1 - self.k_period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            num[i] = bars[i].close - ll;
            den[i] = hh - ll;
        }

        let mut k = vec![f64::NAN; n];
        let first = self.k_period + self.slowing - 2;
        for i in first..n {
            let range = i + 1 - self.slowing..=i;
            let n_sum: f64 = num[range.clone()].iter().sum();
            let d_sum: f64 = den[range].iter().sum();
            if n_sum.is_nan() || d_sum.is_nan() {
                continue;
            }
            k[i] = if d_sum == 0.0 { 50.0 } else { 100.0 * n_sum / d_sum };
        }
        k
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let k = self.k_period + self.slowing - 2;
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => k + self.d_period - 1,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        if bars.len() < self.k_period {
            return vec![f64::NAN; bars.len()];
        }
        let k = self.k_line(bars);
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => sma_of_series(&k, self.d_period),
        }
    }
}
