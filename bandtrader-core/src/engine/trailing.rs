//! ATR trailing stop.
//!
//! Stops only ever tighten: a long stop moves up toward the bid, a short
//! stop moves down toward the ask, and neither is placed on the wrong side
//! of the current price. An unset stop is always improvable.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::state::EngineStats;
use crate::broker::Broker;
use crate::config::TrailingConfig;
use crate::domain::{Direction, SymbolSpec, Ticket};

/// One applied stop move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingUpdate {
    pub ticket: Ticket,
    pub direction: Direction,
    pub previous: Option<f64>,
    pub stop_loss: f64,
}

/// New stop for a position, or `None` when the current one should stay.
pub fn propose_stop(
    direction: Direction,
    current: Option<f64>,
    bid: f64,
    ask: f64,
    atr: f64,
    multiplier: f64,
    spec: &SymbolSpec,
) -> Option<f64> {
    if atr <= 0.0 || !atr.is_finite() {
        return None;
    }
    // A zero stop is how some backends report "unset".
    let current = current.filter(|&sl| sl > 0.0);
    let improves = |candidate: f64| match direction {
        Direction::Long => current.map_or(true, |sl| candidate > sl) && candidate < bid,
        Direction::Short => current.map_or(true, |sl| candidate < sl) && candidate > ask,
    };

    let raw = match direction {
        Direction::Long => bid - atr * multiplier,
        Direction::Short => ask + atr * multiplier,
    };
    if !improves(raw) {
        return None;
    }
    let rounded = spec.normalize_price(raw);
    improves(rounded).then_some(rounded)
}

/// Move the stop of every position attributed to `magic`.
pub fn trail_positions(
    broker: &mut dyn Broker,
    magic: u64,
    atr: f64,
    config: &TrailingConfig,
    stats: &mut EngineStats,
    verbose: bool,
) -> Vec<TrailingUpdate> {
    if !config.enabled || atr <= 0.0 {
        return Vec::new();
    }
    let quote = broker.quote();
    let spec = broker.symbol_spec().clone();
    let mut updates = Vec::new();

    for position in broker.positions(magic) {
        let Some(stop_loss) = propose_stop(
            position.direction,
            position.stop_loss,
            quote.bid,
            quote.ask,
            atr,
            config.atr_multiplier,
            &spec,
        ) else {
            continue;
        };
        match broker.modify(position.ticket, Some(stop_loss), position.take_profit) {
            Ok(()) => {
                stats.trailing_modifications += 1;
                if verbose {
                    debug!(
                        ticket = position.ticket,
                        from = ?position.stop_loss,
                        to = stop_loss,
                        "trailing stop moved"
                    );
                }
                updates.push(TrailingUpdate {
                    ticket: position.ticket,
                    direction: position.direction,
                    previous: position.stop_loss,
                    stop_loss,
                });
            }
            Err(err) => {
                stats.trailing_failures += 1;
                warn!(
                    ticket = position.ticket,
                    code = err.code,
                    description = %err.description,
                    "trailing stop modify failed"
                );
            }
        }
    }
    updates
}
