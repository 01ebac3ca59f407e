//! Pre-trade guards.
//!
//! Each guard inspects the tick's gate context and either lets the order
//! through or names the reason it was blocked. The executor runs them in
//! sequence and stops at the first rejection.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Quote;

/// Why a tick produced no order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    /// Open positions already at the configured cap.
    PositionCap,
    SpreadTooWide { spread: f64, max: f64 },
    Cooldown { elapsed_secs: i64, required_secs: i64 },
    /// Derived stop-loss not on the losing side of the entry.
    InvalidStops,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::PositionCap => write!(f, "PositionCap"),
            Rejection::SpreadTooWide { spread, max } => {
                write!(f, "SpreadTooWide({spread:.5} > {max:.5})")
            }
            Rejection::Cooldown {
                elapsed_secs,
                required_secs,
            } => write!(f, "Cooldown({elapsed_secs}s < {required_secs}s)"),
            Rejection::InvalidStops => write!(f, "InvalidStops"),
        }
    }
}

/// What the guards see.
#[derive(Debug, Clone, Copy)]
pub struct GateContext {
    pub quote: Quote,
    pub point: f64,
    pub now: DateTime<Utc>,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub bar_seconds: i64,
}

pub trait Guard: Send + Sync {
    fn check(&self, ctx: &GateContext) -> Result<(), Rejection>;

    fn name(&self) -> &str;
}

/// Reject when `ask - bid` exceeds `max_points` points.
#[derive(Debug)]
pub struct SpreadGuard {
    pub max_points: u32,
}

impl Guard for SpreadGuard {
    fn check(&self, ctx: &GateContext) -> Result<(), Rejection> {
        let spread = ctx.quote.spread();
        let max = f64::from(self.max_points) * ctx.point;
        if spread > max {
            return Err(Rejection::SpreadTooWide { spread, max });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "spread"
    }
}

/// Reject until `min_bars` full bars have passed since the last execution.
#[derive(Debug)]
pub struct CooldownGuard {
    pub min_bars: u32,
}

impl Guard for CooldownGuard {
    fn check(&self, ctx: &GateContext) -> Result<(), Rejection> {
        let Some(last) = ctx.last_trade_time else {
            return Ok(());
        };
        let elapsed_secs = (ctx.now - last).num_seconds();
        let required_secs = i64::from(self.min_bars) * ctx.bar_seconds;
        if elapsed_secs < required_secs {
            return Err(Rejection::Cooldown {
                elapsed_secs,
                required_secs,
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cooldown"
    }
}
