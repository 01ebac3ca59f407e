//! In-memory execution backend.
//!
//! Market orders fill at the current ask (long) or bid (short). Protective
//! levels are checked whenever a new bar is applied: the stop is tested
//! before the target when both lie inside the same bar, and a bar that
//! opens beyond a level fills at the open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{codes, Broker, BrokerError, OrderRequest};
use crate::domain::{AccountInfo, Bar, Direction, Position, Quote, SymbolSpec, Ticket};

/// Why a position left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Closed,
}

/// A position after it has been closed, with realized profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub ticket: Ticket,
    pub direction: Direction,
    pub volume: f64,
    pub open_price: f64,
    pub open_time: DateTime<Utc>,
    pub close_price: f64,
    pub close_time: DateTime<Utc>,
    pub profit: f64,
    pub reason: ExitReason,
    pub comment: String,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct PaperBroker {
    spec: SymbolSpec,
    balance: f64,
    quote: Quote,
    positions: Vec<Position>,
    closed: Vec<ClosedTrade>,
    next_ticket: Ticket,
    pending_failure: Option<BrokerError>,
}

impl PaperBroker {
    pub fn new(spec: SymbolSpec, balance: f64) -> Self {
        Self {
            spec,
            balance,
            quote: Quote {
                time: DateTime::<Utc>::UNIX_EPOCH,
                bid: 0.0,
                ask: 0.0,
            },
            positions: Vec::new(),
            closed: Vec::new(),
            next_ticket: 1,
            pending_failure: None,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    /// All open positions regardless of strategy id.
    pub fn open_positions(&self) -> &[Position] {
        &self.positions
    }

    /// Replace the quote without checking protective levels.
    pub fn set_quote(&mut self, quote: Quote) {
        self.quote = quote;
    }

    /// Make the next `open` fail with the given code.
    pub fn fail_next_open(&mut self, code: u32, description: impl Into<String>) {
        self.pending_failure = Some(BrokerError::new(code, description));
    }

    /// Check protective levels against the bar's range, then quote its close.
    ///
    /// Prices in the bar are bid prices; the ask is `bid + spread`.
    /// Returns the trades closed by stop or target on this bar.
    pub fn apply_bar(&mut self, bar: &Bar, spread: f64) -> Vec<ClosedTrade> {
        let mut exits = Vec::new();
        for position in &self.positions {
            // Longs exit on the bid, shorts on the ask.
            let offset = match position.direction {
                Direction::Long => 0.0,
                Direction::Short => spread,
            };
            let (open, high, low) = (bar.open + offset, bar.high + offset, bar.low + offset);
            if let Some(hit) = protective_exit(position, open, high, low) {
                exits.push((position.ticket, hit));
            }
        }

        let mut closed_now = Vec::with_capacity(exits.len());
        for (ticket, (price, reason)) in exits {
            if let Some(trade) = self.settle(ticket, price, bar.timestamp, reason) {
                closed_now.push(trade);
            }
        }

        self.quote = Quote {
            time: bar.timestamp,
            bid: bar.close,
            ask: bar.close + spread,
        };
        closed_now
    }

    fn settle(
        &mut self,
        ticket: Ticket,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<ClosedTrade> {
        let idx = self.positions.iter().position(|p| p.ticket == ticket)?;
        let position = self.positions.remove(idx);
        let profit = position.profit_at(price, &self.spec);
        self.balance += profit;
        let trade = ClosedTrade {
            ticket,
            direction: position.direction,
            volume: position.volume,
            open_price: position.open_price,
            open_time: position.open_time,
            close_price: price,
            close_time: time,
            profit,
            reason,
            comment: position.comment,
        };
        self.closed.push(trade.clone());
        Some(trade)
    }

    fn check_stops(
        &self,
        direction: Direction,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<(), BrokerError> {
        let reference = match direction {
            Direction::Long => self.quote.bid,
            Direction::Short => self.quote.ask,
        };
        let sign = direction.sign();
        let sl_ok = stop_loss.map_or(true, |sl| (reference - sl) * sign > 0.0);
        let tp_ok = take_profit.map_or(true, |tp| (tp - reference) * sign > 0.0);
        if sl_ok && tp_ok {
            Ok(())
        } else {
            Err(BrokerError::new(
                codes::INVALID_STOPS,
                format!("invalid stops sl={stop_loss:?} tp={take_profit:?} for {direction} at {reference}"),
            ))
        }
    }
}

/// Price and reason of a stop or target hit within one bar, stop first.
fn protective_exit(position: &Position, open: f64, high: f64, low: f64) -> Option<(f64, ExitReason)> {
    match position.direction {
        Direction::Long => {
            if let Some(sl) = position.stop_loss.filter(|&sl| low <= sl) {
                return Some((open.min(sl), ExitReason::StopLoss));
            }
            if let Some(tp) = position.take_profit.filter(|&tp| high >= tp) {
                return Some((open.max(tp), ExitReason::TakeProfit));
            }
        }
        Direction::Short => {
            if let Some(sl) = position.stop_loss.filter(|&sl| high >= sl) {
                return Some((open.max(sl), ExitReason::StopLoss));
            }
            if let Some(tp) = position.take_profit.filter(|&tp| low <= tp) {
                return Some((open.min(tp), ExitReason::TakeProfit));
            }
        }
    }
    None
}

impl Broker for PaperBroker {
    fn account(&self) -> AccountInfo {
        let floating: f64 = self
            .positions
            .iter()
            .map(|p| p.profit_at(p.exit_price(self.quote.bid, self.quote.ask), &self.spec))
            .sum();
        AccountInfo {
            balance: self.balance,
            equity: self.balance + floating,
        }
    }

    fn symbol_spec(&self) -> &SymbolSpec {
        &self.spec
    }

    fn quote(&self) -> Quote {
        self.quote
    }

    fn positions(&self, magic: u64) -> Vec<Position> {
        self.positions
            .iter()
            .filter(|p| p.magic == magic)
            .cloned()
            .collect()
    }

    fn open(&mut self, request: &OrderRequest) -> Result<Ticket, BrokerError> {
        if let Some(err) = self.pending_failure.take() {
            return Err(err);
        }
        if request.symbol != self.spec.symbol {
            return Err(BrokerError::new(
                codes::REJECTED,
                format!("unknown symbol {}", request.symbol),
            ));
        }
        if self.quote.bid <= 0.0 || self.quote.ask <= 0.0 {
            return Err(BrokerError::new(codes::NO_QUOTE, "no quote"));
        }
        let volume = self
            .spec
            .validate_volume(request.volume)
            .map_err(|e| BrokerError::new(codes::INVALID_VOLUME, e.to_string()))?;
        self.check_stops(request.direction, request.stop_loss, request.take_profit)?;

        let open_price = match request.direction {
            Direction::Long => self.quote.ask,
            Direction::Short => self.quote.bid,
        };
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.positions.push(Position {
            ticket,
            symbol: request.symbol.clone(),
            direction: request.direction,
            volume,
            open_price,
            open_time: self.quote.time,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            magic: request.magic,
            comment: request.comment.clone(),
        });
        Ok(ticket)
    }

    fn close(&mut self, ticket: Ticket) -> Result<(), BrokerError> {
        let position = self
            .positions
            .iter()
            .find(|p| p.ticket == ticket)
            .ok_or_else(|| BrokerError::new(codes::POSITION_NOT_FOUND, format!("no position {ticket}")))?;
        let price = position.exit_price(self.quote.bid, self.quote.ask);
        let time = self.quote.time;
        self.settle(ticket, price, time, ExitReason::Closed);
        Ok(())
    }

    fn modify(
        &mut self,
        ticket: Ticket,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<(), BrokerError> {
        let direction = self
            .positions
            .iter()
            .find(|p| p.ticket == ticket)
            .map(|p| p.direction)
            .ok_or_else(|| BrokerError::new(codes::POSITION_NOT_FOUND, format!("no position {ticket}")))?;
        self.check_stops(direction, stop_loss, take_profit)?;
        if let Some(position) = self.positions.iter_mut().find(|p| p.ticket == ticket) {
            position.stop_loss = stop_loss;
            position.take_profit = take_profit;
        }
        Ok(())
    }
}
