//! Replay adapter. Serves a recorded bar history one bar at a time.
//!
//! Indicators on the feed timeframe are precomputed once at attach time
//! (all indicators are causal, so reading up to the cursor never sees the
//! future). Higher-timeframe EMAs are also built at attach time: one value
//! per completed higher bar, plus the value the forming higher bar would
//! have at each base bar, so a read only reflects closes already seen.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{
    recent_window, validate_spec, Buffer, IndicatorHandle, IndicatorSpec, MarketData,
    MarketDataError, PriceField,
};
use crate::domain::{Bar, Timeframe};
use crate::indicators::{
    Atr, Bollinger, Ema, Indicator, Macd, MacdLine, Momentum, Rsi, Stochastic, StochasticLine,
};

#[derive(Debug, Clone)]
enum Attached {
    Precomputed(HashMap<Buffer, Vec<f64>>),
    HigherTimeframeEma(HigherEma),
}

/// EMA over resampled bars, indexed by base bar.
#[derive(Debug, Clone)]
struct HigherEma {
    /// Higher bar each base bar belongs to.
    bucket: Vec<usize>,
    /// EMA of the resampled history; only entries before the cursor's
    /// bucket are read.
    completed: Vec<f64>,
    /// EMA of the cursor's bucket with its close taken at each base bar.
    forming: Vec<f64>,
}

impl HigherEma {
    fn build(bars: &[Bar], period: usize, timeframe: Timeframe) -> Self {
        let higher = resample(bars, timeframe);
        let closes: Vec<f64> = higher.iter().map(|b| b.close).collect();
        let completed = Ema::new(period).compute(&higher);
        let alpha = 2.0 / (period as f64 + 1.0);

        let mut bucket = Vec::with_capacity(bars.len());
        let mut forming = Vec::with_capacity(bars.len());
        let mut index = 0;
        let mut current = None;
        for bar in bars {
            let start = timeframe.bucket_start(bar.timestamp);
            if current.is_some_and(|c| c != start) {
                index += 1;
            }
            current = Some(start);
            bucket.push(index);

            let value = if index + 1 < period {
                f64::NAN
            } else if index + 1 == period {
                (closes[..index].iter().sum::<f64>() + bar.close) / period as f64
            } else {
                alpha * bar.close + (1.0 - alpha) * completed[index - 1]
            };
            forming.push(value);
        }
        Self { bucket, completed, forming }
    }

    fn read(&self, cursor: usize, count: usize) -> Vec<f64> {
        let Some(&value) = self.forming.get(cursor) else {
            return Vec::new();
        };
        if count == 0 || value.is_nan() {
            return Vec::new();
        }
        let mut out = vec![value];
        let index = self.bucket[cursor];
        if index > 0 {
            out.extend(recent_window(&self.completed, index - 1, count - 1));
        }
        out
    }
}

/// Cursor-driven market data over a bar history (chronological order).
#[derive(Debug, Clone)]
pub struct ReplayFeed {
    bars: Vec<Bar>,
    timeframe: Timeframe,
    cursor: usize,
    attached: Vec<Attached>,
}

impl ReplayFeed {
    /// Create a feed positioned on the first bar.
    pub fn new(bars: Vec<Bar>, timeframe: Timeframe) -> Self {
        Self {
            bars,
            timeframe,
            cursor: 0,
            attached: Vec::new(),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Index of the current bar.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Position the feed on bar `index` (clamped to the last bar).
    pub fn seek(&mut self, index: usize) {
        self.cursor = index.min(self.bars.len().saturating_sub(1));
    }

    /// Move to the next bar. Returns false at the end of history.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.bars.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.bars.get(self.cursor)
    }

    fn precompute(&self, spec: &IndicatorSpec) -> HashMap<Buffer, Vec<f64>> {
        let bars = &self.bars;
        let mut out = HashMap::new();
        match *spec {
            IndicatorSpec::Bands { period, deviation } => {
                out.insert(Buffer::Upper, Bollinger::upper(period, deviation).compute(bars));
                out.insert(Buffer::Middle, Bollinger::middle(period, deviation).compute(bars));
                out.insert(Buffer::Lower, Bollinger::lower(period, deviation).compute(bars));
            }
            IndicatorSpec::Rsi { period } => {
                out.insert(Buffer::Main, Rsi::new(period).compute(bars));
            }
            IndicatorSpec::Momentum { period } => {
                out.insert(Buffer::Main, Momentum::new(period).compute(bars));
            }
            IndicatorSpec::Ema { period, .. } => {
                out.insert(Buffer::Main, Ema::new(period).compute(bars));
            }
            IndicatorSpec::Atr { period } => {
                out.insert(Buffer::Main, Atr::new(period).compute(bars));
            }
            IndicatorSpec::Macd { fast, slow, signal } => {
                for (buffer, line) in [
                    (Buffer::Main, MacdLine::Main),
                    (Buffer::Signal, MacdLine::Signal),
                    (Buffer::Histogram, MacdLine::Histogram),
                ] {
                    out.insert(buffer, Macd::new(fast, slow, signal, line).compute(bars));
                }
            }
            IndicatorSpec::Stochastic { k_period, d_period, slowing } => {
                for (buffer, line) in
                    [(Buffer::Main, StochasticLine::K), (Buffer::Signal, StochasticLine::D)]
                {
                    out.insert(
                        buffer,
                        Stochastic::new(k_period, d_period, slowing, line).compute(bars),
                    );
                }
            }
        }
        out
    }

    fn price_series(&self, field: PriceField) -> impl Iterator<Item = f64> + '_ {
        self.bars[..=self.cursor].iter().rev().map(move |b| match field {
            PriceField::Open => b.open,
            PriceField::High => b.high,
            PriceField::Low => b.low,
            PriceField::Close => b.close,
        })
    }
}

impl MarketData for ReplayFeed {
    fn attach(&mut self, spec: &IndicatorSpec) -> Result<IndicatorHandle, MarketDataError> {
        validate_spec(spec)?;
        let attached = match *spec {
            IndicatorSpec::Ema { period, timeframe } if timeframe != self.timeframe => {
                if timeframe < self.timeframe {
                    return Err(MarketDataError::UnsupportedTimeframe {
                        requested: timeframe,
                        base: self.timeframe,
                    });
                }
                Attached::HigherTimeframeEma(HigherEma::build(&self.bars, period, timeframe))
            }
            _ => Attached::Precomputed(self.precompute(spec)),
        };
        self.attached.push(attached);
        Ok(IndicatorHandle(self.attached.len() - 1))
    }

    fn indicator(&self, handle: IndicatorHandle, buffer: Buffer, count: usize) -> Vec<f64> {
        if self.bars.is_empty() {
            return Vec::new();
        }
        match self.attached.get(handle.0) {
            Some(Attached::Precomputed(lines)) => lines
                .get(&buffer)
                .map(|series| recent_window(series, self.cursor, count))
                .unwrap_or_default(),
            Some(Attached::HigherTimeframeEma(ema)) if buffer == Buffer::Main => {
                ema.read(self.cursor, count)
            }
            Some(Attached::HigherTimeframeEma(_)) => Vec::new(),
            None => Vec::new(),
        }
    }

    fn prices(&self, field: PriceField, count: usize) -> Vec<f64> {
        if self.bars.is_empty() {
            return Vec::new();
        }
        self.price_series(field).take(count).collect()
    }

    fn tick_volume(&self, count: usize) -> Vec<f64> {
        if self.bars.is_empty() {
            return Vec::new();
        }
        self.bars[..=self.cursor]
            .iter()
            .rev()
            .take(count)
            .map(|b| b.tick_volume as f64)
            .collect()
    }
}

/// Aggregate chronological bars into `timeframe` buckets keyed by bucket open time.
pub fn resample(bars: &[Bar], timeframe: Timeframe) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    let mut current_bucket = None;
    for bar in bars {
        let bucket = timeframe.bucket_start(bar.timestamp);
        match out.last_mut() {
            Some(agg) if current_bucket == Some(bucket) => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.tick_volume += bar.tick_volume;
            }
            _ => {
                let open_time =
                    DateTime::<Utc>::from_timestamp(bucket, 0).unwrap_or(bar.timestamp);
                out.push(Bar::new(
                    open_time,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.tick_volume,
                ));
                current_bucket = Some(bucket);
            }
        }
    }
    out
}
