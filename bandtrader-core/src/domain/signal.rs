//! Trade signal: the arbiter's single output per tick.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional intent of a signal or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "Long"),
            Direction::Short => write!(f, "Short"),
        }
    }
}

/// Which detector produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    BbBreakout,
    BbTouch,
    MomentumBreak,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::BbBreakout => write!(f, "BBBreakout"),
            SignalType::BbTouch => write!(f, "BBTouch"),
            SignalType::MomentumBreak => write!(f, "MomentumBreak"),
        }
    }
}

/// A fully specified trade signal.
///
/// Only ever constructed for a valid signal: "no signal" is `None` at the
/// call site, so every field here is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub direction: Direction,
    pub signal_type: SignalType,
    pub strength: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Audit only; not consumed by sizing or execution.
    pub volume_strength: f64,
    /// Audit only; not consumed by sizing or execution.
    pub macd_strength: f64,
    pub reason: String,
}

impl TradeSignal {
    /// Distance between entry and stop-loss, in price units.
    pub fn stop_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    /// True when the stop sits on the losing side of entry and the target on the winning side.
    pub fn has_valid_stops(&self) -> bool {
        let risk = (self.entry_price - self.stop_loss) * self.direction.sign();
        let reward = (self.take_profit - self.entry_price) * self.direction.sign();
        risk > 0.0 && reward > 0.0
    }
}
