//! Pattern detectors over the per-tick rolling window.
//!
//! Detectors are independent and may all fire on the same tick; the arbiter
//! decides which one becomes a signal. A series missing from the window
//! means "no signal" for every detector that needs it.

use crate::domain::Direction;
use crate::market::{require, Buffer, IndicatorHandle, MarketData, PriceField};

const MOMENTUM_UP_LEVEL: f64 = 100.5;
const MOMENTUM_DOWN_LEVEL: f64 = 99.5;

/// Recency-ordered series read once per tick. `None` marks a short read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketWindow {
    pub close: Option<Vec<f64>>,
    pub high: Option<Vec<f64>>,
    pub low: Option<Vec<f64>>,
    pub upper: Option<Vec<f64>>,
    pub lower: Option<Vec<f64>>,
    pub momentum: Option<Vec<f64>>,
}

impl MarketWindow {
    /// Read everything the detectors need for a momentum `lookback`.
    pub fn read(
        market: &dyn MarketData,
        bands: IndicatorHandle,
        momentum: IndicatorHandle,
        lookback: usize,
    ) -> Self {
        let bars = lookback + 1;
        Self {
            close: require(market.prices(PriceField::Close, bars.max(2)), 2),
            high: require(market.prices(PriceField::High, bars), bars),
            low: require(market.prices(PriceField::Low, bars), bars),
            upper: require(market.indicator(bands, Buffer::Upper, 2), 2),
            lower: require(market.indicator(bands, Buffer::Lower, 2), 2),
            momentum: require(market.indicator(momentum, Buffer::Main, 3), 3),
        }
    }

    pub fn current_close(&self) -> Option<f64> {
        self.close.as_ref().map(|c| c[0])
    }
}

/// Which detectors fired this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Detections {
    pub breakout: Option<Direction>,
    pub touch: Option<Direction>,
    pub momentum: Option<Direction>,
}

impl Detections {
    pub fn scan(window: &MarketWindow, touch_threshold: f64, lookback: usize) -> Self {
        Self {
            breakout: band_breakout(window),
            touch: band_touch(window, touch_threshold),
            momentum: momentum_breakout(window, lookback),
        }
    }

    pub fn any(&self) -> bool {
        self.breakout.is_some() || self.touch.is_some() || self.momentum.is_some()
    }
}

/// Close crossed outside the band this bar after closing inside it last bar.
pub fn band_breakout(window: &MarketWindow) -> Option<Direction> {
    let (close, upper, lower) = (window.close.as_ref()?, window.upper.as_ref()?, window.lower.as_ref()?);
    if close[0] > upper[0] && close[1] <= upper[1] {
        Some(Direction::Long)
    } else if close[0] < lower[0] && close[1] >= lower[1] {
        Some(Direction::Short)
    } else {
        None
    }
}

/// Previous close reached the touch zone and the current close moved away from it.
pub fn band_touch(window: &MarketWindow, threshold: f64) -> Option<Direction> {
    let (close, upper, lower) = (window.close.as_ref()?, window.upper.as_ref()?, window.lower.as_ref()?);
    let upper_touch = upper[1] * threshold;
    let lower_touch = lower[1] + (upper[1] - lower[1]) * (1.0 - threshold);
    if close[1] <= lower_touch && close[0] > close[1] {
        Some(Direction::Long)
    } else if close[1] >= upper_touch && close[0] < close[1] {
        Some(Direction::Short)
    } else {
        None
    }
}

/// Three bars of monotonic momentum beyond its level, confirmed by the
/// close breaking the high/low of bars `1..=lookback`.
pub fn momentum_breakout(window: &MarketWindow, lookback: usize) -> Option<Direction> {
    let mom = window.momentum.as_ref()?;
    let close = window.close.as_ref()?;
    let (high, low) = (window.high.as_ref()?, window.low.as_ref()?);
    if lookback == 0 || high.len() <= lookback || low.len() <= lookback {
        return None;
    }
    let highest = high[1..=lookback].iter().copied().fold(f64::MIN, f64::max);
    let lowest = low[1..=lookback].iter().copied().fold(f64::MAX, f64::min);

    let rising = mom[0] > mom[1] && mom[1] > mom[2];
    let falling = mom[0] < mom[1] && mom[1] < mom[2];
    if rising && mom[0] > MOMENTUM_UP_LEVEL && close[0] > highest {
        Some(Direction::Long)
    } else if falling && mom[0] < MOMENTUM_DOWN_LEVEL && close[0] < lowest {
        Some(Direction::Short)
    } else {
        None
    }
}
