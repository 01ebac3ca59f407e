//! Position sizing.
//!
//! Sizers turn a stop distance and account balance into a lot size the
//! instrument accepts. They never decide direction or entry.

use crate::domain::SymbolSpec;

pub trait Sizer: Send + Sync {
    /// Lot size for a trade whose stop sits `stop_distance` price units away.
    fn size(&self, balance: f64, stop_distance: f64, spec: &SymbolSpec) -> f64;

    fn name(&self) -> &str;
}

/// Risk a fixed percent of balance between entry and stop.
///
/// ```text
/// risk_amount = balance * risk_percent / 100
/// lots        = risk_amount / (stop_distance / tick_size * tick_value)
/// ```
///
/// The result is floored to the volume step and clamped to the volume
/// limits. With a zero tick size, tick value or distance the fallback lot
/// is returned as is.
#[derive(Debug, Clone)]
pub struct RiskPercentSizer {
    risk_percent: f64,
    fallback_lot: f64,
}

impl RiskPercentSizer {
    pub fn new(risk_percent: f64, fallback_lot: f64) -> Self {
        Self {
            risk_percent,
            fallback_lot,
        }
    }
}

impl Sizer for RiskPercentSizer {
    fn size(&self, balance: f64, stop_distance: f64, spec: &SymbolSpec) -> f64 {
        if spec.tick_value == 0.0 || spec.tick_size == 0.0 || stop_distance == 0.0 {
            return self.fallback_lot;
        }
        let risk_amount = balance * self.risk_percent / 100.0;
        let loss_per_lot = stop_distance.abs() / spec.tick_size * spec.tick_value;
        spec.normalize_volume(risk_amount / loss_per_lot)
    }

    fn name(&self) -> &str {
        "risk_percent"
    }
}
