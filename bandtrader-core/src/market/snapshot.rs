//! In-memory adapter holding fixed, recency-ordered series.
//!
//! Used to drive the engine with hand-picked values: every series is stored
//! exactly as `MarketData` returns it (index 0 = current bar).

use std::collections::{HashMap, HashSet};

use super::{
    validate_spec, Buffer, IndicatorHandle, IndicatorKind, IndicatorSpec, MarketData,
    MarketDataError, PriceField,
};

#[derive(Debug, Clone, Default)]
pub struct SnapshotFeed {
    attached: Vec<IndicatorKind>,
    series: HashMap<(IndicatorKind, Buffer), Vec<f64>>,
    prices: HashMap<PriceField, Vec<f64>>,
    volume: Vec<f64>,
    failing: HashSet<IndicatorKind>,
}

impl SnapshotFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one indicator line, most recent first.
    pub fn set_indicator(&mut self, kind: IndicatorKind, buffer: Buffer, values: Vec<f64>) {
        self.series.insert((kind, buffer), values);
    }

    pub fn set_prices(&mut self, field: PriceField, values: Vec<f64>) {
        self.prices.insert(field, values);
    }

    pub fn set_tick_volume(&mut self, values: Vec<f64>) {
        self.volume = values;
    }

    /// Make every later `attach` of `kind` fail.
    pub fn fail_attach(&mut self, kind: IndicatorKind) {
        self.failing.insert(kind);
    }

    /// Kinds attached so far, in attach order.
    pub fn attached(&self) -> &[IndicatorKind] {
        &self.attached
    }
}

impl MarketData for SnapshotFeed {
    fn attach(&mut self, spec: &IndicatorSpec) -> Result<IndicatorHandle, MarketDataError> {
        validate_spec(spec)?;
        let kind = spec.kind();
        if self.failing.contains(&kind) {
            return Err(MarketDataError::Unavailable(kind));
        }
        self.attached.push(kind);
        Ok(IndicatorHandle(self.attached.len() - 1))
    }

    fn indicator(&self, handle: IndicatorHandle, buffer: Buffer, count: usize) -> Vec<f64> {
        self.attached
            .get(handle.0)
            .and_then(|kind| self.series.get(&(*kind, buffer)))
            .map(|values| values.iter().take(count).copied().collect())
            .unwrap_or_default()
    }

    fn prices(&self, field: PriceField, count: usize) -> Vec<f64> {
        self.prices
            .get(&field)
            .map(|values| values.iter().take(count).copied().collect())
            .unwrap_or_default()
    }

    fn tick_volume(&self, count: usize) -> Vec<f64> {
        self.volume.iter().take(count).copied().collect()
    }
}
