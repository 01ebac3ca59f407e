use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Direction, SymbolSpec};

/// Broker-assigned position identifier.
pub type Ticket = u64;

/// Live view of an open position, as read from the execution backend.
///
/// The engine never keeps its own copy across ticks; it re-reads positions
/// every tick. `stop_loss`/`take_profit` are `None` when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub open_price: f64,
    pub open_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Strategy identifier the position was opened under.
    pub magic: u64,
    pub comment: String,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    /// Price at which the position would be closed right now.
    pub fn exit_price(&self, bid: f64, ask: f64) -> f64 {
        match self.direction {
            Direction::Long => bid,
            Direction::Short => ask,
        }
    }

    /// Profit in account currency if closed at `exit_price`.
    pub fn profit_at(&self, exit_price: f64, spec: &SymbolSpec) -> f64 {
        if spec.tick_size <= 0.0 {
            return 0.0;
        }
        let move_ticks = (exit_price - self.open_price) * self.direction.sign() / spec.tick_size;
        move_ticks * spec.tick_value * self.volume
    }
}
