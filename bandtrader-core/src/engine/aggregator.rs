//! Indicator aggregator: volume strength, MACD strength and market regime.
//!
//! Each descriptor has a pure scoring function over recency-ordered samples
//! and a reader that fetches those samples. A short read yields the neutral
//! value instead of an error.

use crate::config::EngineConfig;
use crate::domain::MarketState;
use crate::market::{require, Buffer, IndicatorHandle, MarketData, PriceField};

/// Neutral score for insufficient data.
pub const NEUTRAL_STRENGTH: f64 = 0.5;
/// MACD strength reported when the MACD filter is off (slightly bullish).
pub const MACD_DISABLED_STRENGTH: f64 = 0.6;

const RECENT_BARS: usize = 5;
const VOLUME_MIN: f64 = 0.1;
const VOLUME_MAX: f64 = 3.0;
const WIDTH_BARS: usize = 5;
const TREND_BARS: usize = 4;
const EXPANSION_RATIO: f64 = 1.2;

/// Score tick volume from `ma_period + 5` samples, most recent first.
pub fn score_volume(samples: &[f64], ma_period: usize) -> f64 {
    let needed = ma_period + RECENT_BARS;
    if samples.len() < needed {
        return NEUTRAL_STRENGTH;
    }
    let window = &samples[..needed];
    let current = window[0];
    let avg = window.iter().sum::<f64>() / needed as f64;
    let max = window.iter().copied().fold(f64::MIN, f64::max);
    let recent = window[..RECENT_BARS].iter().sum::<f64>() / RECENT_BARS as f64;
    if avg <= 0.0 || max <= 0.0 || recent <= 0.0 {
        return NEUTRAL_STRENGTH;
    }

    let ratio = current / avg;
    let percentile = current / max;
    let trend = current / recent;
    (0.4 * ratio + 0.3 * percentile + 0.3 * trend).clamp(VOLUME_MIN, VOLUME_MAX)
}

pub fn volume_strength(market: &dyn MarketData, ma_period: usize) -> f64 {
    let needed = ma_period + RECENT_BARS;
    match require(market.tick_volume(needed), needed) {
        Some(samples) => score_volume(&samples, ma_period),
        None => NEUTRAL_STRENGTH,
    }
}

/// Score MACD from its three lines, three samples each, most recent first.
pub fn score_macd(main: &[f64], signal: &[f64], hist: &[f64]) -> f64 {
    if main.len() < 3 || signal.is_empty() || hist.len() < 2 {
        return NEUTRAL_STRENGTH;
    }
    let mut score = NEUTRAL_STRENGTH;

    if main[0] > signal[0] {
        score += 0.2;
    } else if main[0] < signal[0] {
        score -= 0.2;
    }

    if main[0] > main[1] && main[1] > main[2] {
        score += 0.1;
    } else if main[0] < main[1] && main[1] < main[2] {
        score -= 0.1;
    }

    if hist[0] > 0.0 && hist[0] > hist[1] {
        score += 0.15;
    } else if hist[0] < 0.0 && hist[0] < hist[1] {
        score -= 0.15;
    }

    // Zero-line cross dominates.
    if main[1] <= 0.0 && main[0] > 0.0 {
        score += 0.3;
    } else if main[1] >= 0.0 && main[0] < 0.0 {
        score -= 0.3;
    }

    score.clamp(0.0, 1.0)
}

pub fn macd_strength(market: &dyn MarketData, macd: IndicatorHandle, enabled: bool) -> f64 {
    if !enabled {
        return MACD_DISABLED_STRENGTH;
    }
    let read = |buffer| require(market.indicator(macd, buffer, 3), 3);
    match (read(Buffer::Main), read(Buffer::Signal), read(Buffer::Histogram)) {
        (Some(main), Some(signal), Some(hist)) => score_macd(&main, &signal, &hist),
        _ => NEUTRAL_STRENGTH,
    }
}

/// Classify the regime from band edges (5 samples), closes (5) and the
/// current RSI. Squeeze is checked before expansion.
pub fn classify_market(
    upper: &[f64],
    lower: &[f64],
    close: &[f64],
    rsi: f64,
    squeeze_threshold: f64,
) -> MarketState {
    if upper.len() < WIDTH_BARS || lower.len() < WIDTH_BARS || close.len() < TREND_BARS + 1 {
        return MarketState::Ranging;
    }
    let widths: Vec<f64> = upper.iter().zip(lower).take(WIDTH_BARS).map(|(u, l)| u - l).collect();
    let avg_width = widths.iter().sum::<f64>() / WIDTH_BARS as f64;
    let width = widths[0];

    if width < avg_width * squeeze_threshold {
        return MarketState::Squeeze;
    }
    if width > avg_width * EXPANSION_RATIO {
        let trend_score: i32 = (0..TREND_BARS)
            .map(|i| match close[i].partial_cmp(&close[i + 1]) {
                Some(std::cmp::Ordering::Greater) => 1,
                Some(std::cmp::Ordering::Less) => -1,
                _ => 0,
            })
            .sum();
        return if trend_score >= 2 && rsi > 55.0 {
            MarketState::TrendingUp
        } else if trend_score <= -2 && rsi < 45.0 {
            MarketState::TrendingDown
        } else {
            MarketState::Volatile
        };
    }
    MarketState::Ranging
}

pub fn market_state(
    market: &dyn MarketData,
    bands: IndicatorHandle,
    rsi: IndicatorHandle,
    config: &EngineConfig,
) -> MarketState {
    let upper = require(market.indicator(bands, Buffer::Upper, WIDTH_BARS), WIDTH_BARS);
    let lower = require(market.indicator(bands, Buffer::Lower, WIDTH_BARS), WIDTH_BARS);
    let close = require(market.prices(PriceField::Close, TREND_BARS + 1), TREND_BARS + 1);
    let rsi = require(market.indicator(rsi, Buffer::Main, 1), 1);
    match (upper, lower, close, rsi) {
        (Some(upper), Some(lower), Some(close), Some(rsi)) => {
            classify_market(&upper, &lower, &close, rsi[0], config.bands.squeeze_threshold)
        }
        _ => MarketState::Ranging,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;
    use crate::market::{IndicatorKind, IndicatorSpec, SnapshotFeed};

    const EPS: f64 = 1e-12;

    #[test]
    fn volume_exactly_ma_period_is_neutral() {
        let samples = vec![100.0; 20];
        assert_eq!(score_volume(&samples, 20), NEUTRAL_STRENGTH);
    }

    #[test]
    fn flat_volume_scores_one() {
        let samples = vec![100.0; 25];
        assert_approx(score_volume(&samples, 20), 1.0, EPS);
    }

    #[test]
    fn volume_spike() {
        let mut samples = vec![100.0; 25];
        samples[0] = 200.0;
        // avg 104, max 200, recent 120
        let expected = 0.4 * (200.0 / 104.0) + 0.3 + 0.3 * (200.0 / 120.0);
        assert_approx(score_volume(&samples, 20), expected, EPS);
    }

    #[test]
    fn volume_clamped() {
        let mut samples = vec![1.0; 25];
        samples[0] = 10_000.0;
        assert_eq!(score_volume(&samples, 20), VOLUME_MAX);
        let mut samples = vec![100.0; 25];
        samples[0] = 0.0;
        assert_eq!(score_volume(&samples, 20), VOLUME_MIN);
    }

    #[test]
    fn zero_volume_window_is_neutral() {
        assert_eq!(score_volume(&[0.0; 25], 20), NEUTRAL_STRENGTH);
    }

    #[test]
    fn volume_reader_soft_fails() {
        let mut feed = SnapshotFeed::new();
        feed.set_tick_volume(vec![100.0; 24]);
        assert_eq!(volume_strength(&feed, 20), NEUTRAL_STRENGTH);
        feed.set_tick_volume(vec![100.0; 25]);
        assert_approx(volume_strength(&feed, 20), 1.0, EPS);
    }

    #[test]
    fn macd_full_bull() {
        // main above signal, rising, histogram growing, zero cross
        let score = score_macd(&[0.2, -0.1, -0.3], &[0.1, 0.0, 0.0], &[0.1, -0.1, -0.3]);
        assert_approx(score, 1.0, EPS);
    }

    #[test]
    fn macd_partial_bear() {
        // main below signal (-0.2), falling (-0.1), histogram negative and falling (-0.15)
        let score = score_macd(&[-0.3, -0.2, -0.1], &[-0.1, -0.1, -0.1], &[-0.2, -0.1, 0.0]);
        assert_approx(score, 0.05, 1e-9);
    }

    #[test]
    fn macd_zero_cross_down() {
        let score = score_macd(&[-0.1, 0.1, 0.0], &[-0.1, 0.0, 0.0], &[0.0, 0.1, 0.0]);
        // equal lines: 0, no slope, no histogram growth, cross down -0.3
        assert_approx(score, 0.2, EPS);
    }

    #[test]
    fn macd_disabled_and_short_read() {
        let mut feed = SnapshotFeed::new();
        let handle = feed
            .attach(&IndicatorSpec::Macd { fast: 12, slow: 26, signal: 9 })
            .unwrap();
        assert_eq!(macd_strength(&feed, handle, false), MACD_DISABLED_STRENGTH);
        feed.set_indicator(IndicatorKind::Macd, Buffer::Main, vec![0.1, 0.0]);
        assert_eq!(macd_strength(&feed, handle, true), NEUTRAL_STRENGTH);
    }

    #[test]
    fn squeeze_checked_first() {
        let upper = [1.01, 1.05, 1.05, 1.05, 1.05];
        let lower = [0.99, 0.95, 0.95, 0.95, 0.95];
        let close = [1.0, 0.9, 0.8, 0.7, 0.6];
        assert_eq!(classify_market(&upper, &lower, &close, 70.0, 0.8), MarketState::Squeeze);
    }

    #[test]
    fn expansion_with_trend() {
        let upper = [1.5, 1.1, 1.1, 1.1, 1.1];
        let lower = [0.5, 0.9, 0.9, 0.9, 0.9];
        let rising = [5.0, 4.0, 3.0, 2.0, 1.0];
        let falling = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(classify_market(&upper, &lower, &rising, 60.0, 0.8), MarketState::TrendingUp);
        assert_eq!(classify_market(&upper, &lower, &falling, 40.0, 0.8), MarketState::TrendingDown);
        // trend without RSI confirmation
        assert_eq!(classify_market(&upper, &lower, &rising, 50.0, 0.8), MarketState::Volatile);
    }

    #[test]
    fn steady_width_is_ranging() {
        let upper = [1.1; 5];
        let lower = [0.9; 5];
        let close = [1.0; 5];
        assert_eq!(classify_market(&upper, &lower, &close, 50.0, 0.8), MarketState::Ranging);
    }

    #[test]
    fn short_band_read_is_ranging() {
        let mut feed = SnapshotFeed::new();
        let bands = feed.attach(&IndicatorSpec::Bands { period: 20, deviation: 2.0 }).unwrap();
        let rsi = feed.attach(&IndicatorSpec::Rsi { period: 14 }).unwrap();
        feed.set_indicator(IndicatorKind::Bands, Buffer::Upper, vec![1.5, 1.1, 1.1, 1.1]);
        feed.set_indicator(IndicatorKind::Bands, Buffer::Lower, vec![0.5, 0.9, 0.9, 0.9, 0.9]);
        feed.set_prices(PriceField::Close, vec![5.0, 4.0, 3.0, 2.0, 1.0]);
        feed.set_indicator(IndicatorKind::Rsi, Buffer::Main, vec![60.0]);
        let config = EngineConfig::default();
        assert_eq!(market_state(&feed, bands, rsi, &config), MarketState::Ranging);
        feed.set_indicator(IndicatorKind::Bands, Buffer::Upper, vec![1.5, 1.1, 1.1, 1.1, 1.1]);
        assert_eq!(market_state(&feed, bands, rsi, &config), MarketState::TrendingUp);
    }
}
