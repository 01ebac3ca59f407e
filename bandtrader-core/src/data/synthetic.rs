//! Seeded synthetic bars.
//!
//! A geometric random walk with a slowly drifting trend term, so the series
//! alternates between quiet ranges and directional runs. The same seed always
//! produces the same bars.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, Timeframe};

#[derive(Debug, Clone)]
pub struct SyntheticParams {
    pub start: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub start_price: f64,
    /// Per-bar return standard deviation.
    pub volatility: f64,
    pub base_volume: u64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            start: DateTime::<Utc>::UNIX_EPOCH + Duration::days(19_723), // 2024-01-01
            timeframe: Timeframe::M15,
            start_price: 1.1000,
            volatility: 0.0008,
            base_volume: 500,
        }
    }
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

pub fn synthetic_bars(count: usize, seed: u64, params: &SyntheticParams) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let step = Duration::seconds(params.timeframe.seconds());
    let sigma = params.volatility;
    let mut bars = Vec::with_capacity(count);
    let mut price = params.start_price;
    let mut trend = 0.0_f64;

    for i in 0..count {
        trend = 0.97 * trend + 0.25 * sigma * gaussian(&mut rng);
        let ret = trend + sigma * gaussian(&mut rng);
        let open = price;
        let close = (open * ret.exp()).max(f64::EPSILON);
        let wick_up = open.max(close) * sigma * 0.5 * gaussian(&mut rng).abs();
        let wick_down = open.min(close) * sigma * 0.5 * gaussian(&mut rng).abs();
        let activity = 1.0 + (ret.abs() / sigma).min(4.0);
        let volume = (params.base_volume as f64 * activity * rng.gen_range(0.5..1.5)).round() as u64;

        bars.push(Bar::new(
            params.start + step * i as i32,
            open,
            open.max(close) + wick_up,
            (open.min(close) - wick_down).max(f64::EPSILON),
            close,
            volume.max(1),
        ));
        price = close;
    }
    bars
}
