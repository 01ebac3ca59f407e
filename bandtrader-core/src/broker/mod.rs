//! Execution backend port.
//!
//! Positions are owned by the backend. The engine re-reads them every tick
//! and only ever acts through `open`, `close` and `modify`.

pub mod paper;

pub use paper::{ClosedTrade, ExitReason, PaperBroker};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AccountInfo, Direction, Position, Quote, SymbolSpec, Ticket};

/// Result codes reported with a rejected request.
pub mod codes {
    pub const REJECTED: u32 = 10006;
    pub const INVALID_VOLUME: u32 = 10014;
    pub const INVALID_STOPS: u32 = 10016;
    pub const NO_QUOTE: u32 = 10021;
    pub const POSITION_NOT_FOUND: u32 = 10036;
}

/// A rejected backend request: result code plus description.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("broker error {code}: {description}")]
pub struct BrokerError {
    pub code: u32,
    pub description: String,
}

impl BrokerError {
    pub fn new(code: u32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

/// Market order submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub magic: u64,
    /// Audit tag stored on the resulting position.
    pub comment: String,
}

pub trait Broker {
    fn account(&self) -> AccountInfo;

    fn symbol_spec(&self) -> &SymbolSpec;

    fn quote(&self) -> Quote;

    /// Open positions attributed to `magic`.
    fn positions(&self, magic: u64) -> Vec<Position>;

    /// Submit a market order. Returns the ticket of the new position.
    fn open(&mut self, request: &OrderRequest) -> Result<Ticket, BrokerError>;

    /// Close a position at market.
    fn close(&mut self, ticket: Ticket) -> Result<(), BrokerError>;

    /// Replace the stop-loss and take-profit of an open position.
    fn modify(
        &mut self,
        ticket: Ticket,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<(), BrokerError>;
}
