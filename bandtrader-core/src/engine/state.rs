//! Engine context: indicator handles, cross-tick state and counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::guards::Rejection;
use crate::domain::SignalType;
use crate::market::IndicatorHandle;

/// Handles acquired at engine start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorHandles {
    pub bands: IndicatorHandle,
    pub rsi: IndicatorHandle,
    pub momentum: IndicatorHandle,
    pub atr: IndicatorHandle,
    pub macd: IndicatorHandle,
    pub stochastic: IndicatorHandle,
    /// Present only when the trend filter is enabled.
    pub trend_ema: Option<IndicatorHandle>,
}

/// State carried from one tick to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    /// Time of the last successful submission.
    pub last_trade_time: Option<DateTime<Utc>>,
    /// Last ATR value read; kept when a read comes back short.
    pub current_atr: f64,
    pub stats: EngineStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub ticks: u64,
    pub signals_breakout: u64,
    pub signals_touch: u64,
    pub signals_momentum: u64,
    pub executions: u64,
    pub rejected_position_cap: u64,
    pub rejected_spread: u64,
    pub rejected_cooldown: u64,
    pub rejected_invalid_stops: u64,
    pub submit_failures: u64,
    pub trailing_modifications: u64,
    pub trailing_failures: u64,
    pub opposite_closes: u64,
}

impl EngineStats {
    pub fn record_signal(&mut self, signal_type: SignalType) {
        match signal_type {
            SignalType::BbBreakout => self.signals_breakout += 1,
            SignalType::BbTouch => self.signals_touch += 1,
            SignalType::MomentumBreak => self.signals_momentum += 1,
        }
    }

    pub fn record_rejection(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::PositionCap => self.rejected_position_cap += 1,
            Rejection::SpreadTooWide { .. } => self.rejected_spread += 1,
            Rejection::Cooldown { .. } => self.rejected_cooldown += 1,
            Rejection::InvalidStops => self.rejected_invalid_stops += 1,
        }
    }

    pub fn signals(&self) -> u64 {
        self.signals_breakout + self.signals_touch + self.signals_momentum
    }

    pub fn rejections(&self) -> u64 {
        self.rejected_position_cap
            + self.rejected_spread
            + self.rejected_cooldown
            + self.rejected_invalid_stops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters() {
        let mut stats = EngineStats::default();
        stats.record_signal(SignalType::BbTouch);
        stats.record_signal(SignalType::BbBreakout);
        stats.record_rejection(&Rejection::PositionCap);
        stats.record_rejection(&Rejection::Cooldown { elapsed_secs: 1, required_secs: 2 });
        assert_eq!(stats.signals(), 2);
        assert_eq!(stats.signals_touch, 1);
        assert_eq!(stats.rejections(), 2);
        assert_eq!(stats.rejected_cooldown, 1);
    }
}
