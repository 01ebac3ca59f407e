//! Order executor: pre-trade gate, opposite-position flattening and
//! submission.
//!
//! Gate states per evaluation: `Idle -> Evaluating -> {Rejected, Executing} -> Idle`.
//! A failed submission is reported once and not retried within the tick.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::guards::{CooldownGuard, GateContext, Guard, SpreadGuard};
use super::sizer::{RiskPercentSizer, Sizer};
use super::state::EngineState;
use super::TickOutcome;
use crate::broker::{Broker, OrderRequest};
use crate::config::EngineConfig;
use crate::domain::TradeSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    Idle,
    Evaluating,
    Rejected,
    Executing,
}

pub struct Executor {
    guards: Vec<Box<dyn Guard>>,
    sizer: Box<dyn Sizer>,
    symbol: String,
    magic: u64,
    bar_seconds: i64,
    close_opposite: bool,
    verbose: bool,
    state: GateState,
    path: Vec<GateState>,
}

impl Executor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            guards: vec![
                Box::new(SpreadGuard {
                    max_points: config.execution.max_spread_points,
                }),
                Box::new(CooldownGuard {
                    min_bars: config.execution.min_bars_between,
                }),
            ],
            sizer: Box::new(RiskPercentSizer::new(
                config.risk.risk_percent,
                config.risk.fallback_lot,
            )),
            symbol: config.symbol.clone(),
            magic: config.magic,
            bar_seconds: config.timeframe.seconds(),
            close_opposite: config.execution.close_opposite,
            verbose: config.verbose,
            state: GateState::Idle,
            path: vec![GateState::Idle],
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// States visited by the most recent evaluation, starting and ending at `Idle`.
    pub fn last_path(&self) -> &[GateState] {
        &self.path
    }

    fn enter(&mut self, state: GateState) {
        self.state = state;
        self.path.push(state);
    }

    /// Run the gate for `signal` and submit it if every guard passes.
    pub fn execute(
        &mut self,
        signal: &TradeSignal,
        state: &mut EngineState,
        broker: &mut dyn Broker,
    ) -> TickOutcome {
        self.path.clear();
        self.path.push(GateState::Idle);
        self.enter(GateState::Evaluating);
        let outcome = self.evaluate(signal, state, broker);
        self.enter(GateState::Idle);
        outcome
    }

    fn evaluate(
        &mut self,
        signal: &TradeSignal,
        state: &mut EngineState,
        broker: &mut dyn Broker,
    ) -> TickOutcome {
        let quote = broker.quote();
        let ctx = GateContext {
            quote,
            point: broker.symbol_spec().point,
            now: quote.time,
            last_trade_time: state.last_trade_time,
            bar_seconds: self.bar_seconds,
        };
        let blocked = self
            .guards
            .iter()
            .find_map(|guard| guard.check(&ctx).err().map(|r| (guard.name().to_string(), r)));
        if let Some((guard, rejection)) = blocked {
            self.enter(GateState::Rejected);
            state.stats.record_rejection(&rejection);
            if self.verbose {
                debug!(guard = %guard, %rejection, "order blocked");
            }
            return TickOutcome::Rejected(rejection);
        }

        self.enter(GateState::Executing);
        if self.close_opposite {
            self.close_opposite_positions(signal, state, broker);
        }

        let spec = broker.symbol_spec().clone();
        let balance = broker.account().balance;
        let volume = self.sizer.size(balance, signal.stop_distance(), &spec);
        let request = OrderRequest {
            symbol: self.symbol.clone(),
            direction: signal.direction,
            volume,
            stop_loss: Some(spec.normalize_price(signal.stop_loss)),
            take_profit: Some(spec.normalize_price(signal.take_profit)),
            magic: self.magic,
            comment: signal.reason.clone(),
        };

        match broker.open(&request) {
            Ok(ticket) => {
                state.last_trade_time = Some(ctx.now);
                state.stats.executions += 1;
                info!(
                    ticket,
                    direction = %signal.direction,
                    volume,
                    sl = ?request.stop_loss,
                    tp = ?request.take_profit,
                    sizer = self.sizer.name(),
                    reason = %signal.reason,
                    "order executed"
                );
                TickOutcome::Executed { ticket, volume }
            }
            Err(err) => {
                state.stats.submit_failures += 1;
                warn!(code = err.code, description = %err.description, "order submission failed");
                TickOutcome::SubmitFailed {
                    code: err.code,
                    description: err.description,
                }
            }
        }
    }

    fn close_opposite_positions(
        &self,
        signal: &TradeSignal,
        state: &mut EngineState,
        broker: &mut dyn Broker,
    ) {
        let opposite: Vec<_> = broker
            .positions(self.magic)
            .into_iter()
            .filter(|p| p.direction == signal.direction.opposite())
            .map(|p| p.ticket)
            .collect();
        for ticket in opposite {
            match broker.close(ticket) {
                Ok(()) => {
                    state.stats.opposite_closes += 1;
                    info!(ticket, "closed opposite position");
                }
                Err(err) => {
                    warn!(ticket, code = err.code, description = %err.description, "close failed");
                }
            }
        }
    }
}
