//! Tick-driven signal and execution engine.
//!
//! One `on_tick` call performs a full pass:
//!
//! 1. Refresh ATR (the last good value is kept on a short read)
//! 2. Trail stops of open positions (independent of signals)
//! 3. Score volume, MACD and the market regime
//! 4. Position cap, detectors, arbitration, stop derivation
//! 5. Pre-trade gate and submission
//!
//! Reads that come back short degrade to neutral values; nothing inside a
//! tick returns an error. The only fatal path is `Engine::new`, which must
//! acquire every indicator handle.

pub mod aggregator;
pub mod arbiter;
pub mod detectors;
pub mod executor;
pub mod guards;
pub mod sizer;
pub mod state;
pub mod trailing;

pub use arbiter::{Arbitration, Candidate, StrengthInputs};
pub use detectors::{Detections, MarketWindow};
pub use executor::{Executor, GateState};
pub use guards::Rejection;
pub use sizer::{RiskPercentSizer, Sizer};
pub use state::{EngineState, EngineStats, IndicatorHandles};
pub use trailing::TrailingUpdate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::broker::Broker;
use crate::config::{ConfigError, EngineConfig};
use crate::domain::{MarketState, Ticket, TradeSignal};
use crate::fingerprint;
use crate::market::{
    require, Buffer, IndicatorHandle, IndicatorKind, IndicatorSpec, MarketData, MarketDataError,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("indicator {kind:?} unavailable: {source}")]
    IndicatorUnavailable {
        kind: IndicatorKind,
        #[source]
        source: MarketDataError,
    },
}

/// What the tick did after scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TickOutcome {
    NoSignal,
    Rejected(Rejection),
    Executed { ticket: Ticket, volume: f64 },
    SubmitFailed { code: u32, description: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub time: DateTime<Utc>,
    pub market_state: MarketState,
    pub volume_strength: f64,
    pub macd_strength: f64,
    /// The valid signal of this tick, if any.
    pub signal: Option<TradeSignal>,
    pub outcome: TickOutcome,
    pub trailing_updates: Vec<TrailingUpdate>,
}

pub struct Engine {
    config: EngineConfig,
    handles: IndicatorHandles,
    state: EngineState,
    executor: Executor,
    fingerprint: String,
}

fn attach(market: &mut dyn MarketData, spec: IndicatorSpec) -> Result<IndicatorHandle, EngineError> {
    market
        .attach(&spec)
        .map_err(|source| EngineError::IndicatorUnavailable {
            kind: spec.kind(),
            source,
        })
}

impl Engine {
    /// Validate the configuration and acquire every indicator handle.
    pub fn new(config: EngineConfig, market: &mut dyn MarketData) -> Result<Self, EngineError> {
        config.validate()?;

        let handles = IndicatorHandles {
            bands: attach(
                market,
                IndicatorSpec::Bands {
                    period: config.bands.period,
                    deviation: config.bands.deviation,
                },
            )?,
            rsi: attach(market, IndicatorSpec::Rsi { period: config.rsi.period })?,
            momentum: attach(market, IndicatorSpec::Momentum { period: config.momentum.period })?,
            atr: attach(market, IndicatorSpec::Atr { period: config.risk.atr_period })?,
            macd: attach(
                market,
                IndicatorSpec::Macd {
                    fast: config.macd.fast,
                    slow: config.macd.slow,
                    signal: config.macd.signal,
                },
            )?,
            stochastic: attach(
                market,
                IndicatorSpec::Stochastic {
                    k_period: config.stochastic.k_period,
                    d_period: config.stochastic.d_period,
                    slowing: config.stochastic.slowing,
                },
            )?,
            trend_ema: if config.trend_filter.enabled {
                Some(attach(
                    market,
                    IndicatorSpec::Ema {
                        period: config.trend_filter.ema_period,
                        timeframe: config.trend_filter.timeframe,
                    },
                )?)
            } else {
                None
            },
        };

        let fingerprint = fingerprint::config_hash(&config);
        info!(
            symbol = %config.symbol,
            timeframe = %config.timeframe,
            magic = config.magic,
            fingerprint = fingerprint::short(&fingerprint),
            "engine started"
        );

        Ok(Self {
            executor: Executor::new(&config),
            config,
            handles,
            state: EngineState::default(),
            fingerprint,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn stats(&self) -> &EngineStats {
        &self.state.stats
    }

    pub fn last_trade_time(&self) -> Option<DateTime<Utc>> {
        self.state.last_trade_time
    }

    pub fn current_atr(&self) -> f64 {
        self.state.current_atr
    }

    pub fn gate_state(&self) -> GateState {
        self.executor.state()
    }

    pub fn last_gate_path(&self) -> &[GateState] {
        self.executor.last_path()
    }

    /// Process one price tick.
    pub fn on_tick(&mut self, market: &dyn MarketData, broker: &mut dyn Broker) -> TickReport {
        let verbose = self.config.verbose;
        let time = broker.quote().time;
        self.state.stats.ticks += 1;

        if let Some(atr) = require(market.indicator(self.handles.atr, Buffer::Main, 1), 1) {
            self.state.current_atr = atr[0];
        }

        let trailing_updates = trailing::trail_positions(
            broker,
            self.config.magic,
            self.state.current_atr,
            &self.config.trailing,
            &mut self.state.stats,
            verbose,
        );

        let market_state =
            aggregator::market_state(market, self.handles.bands, self.handles.rsi, &self.config);
        let volume_strength = aggregator::volume_strength(market, self.config.volume.ma_period);
        let macd_strength =
            aggregator::macd_strength(market, self.handles.macd, self.config.macd.enabled);
        if verbose {
            let stoch = |buffer| market.indicator(self.handles.stochastic, buffer, 1).first().copied();
            debug!(
                %market_state,
                volume_strength,
                macd_strength,
                atr = self.state.current_atr,
                stoch_k = ?stoch(Buffer::Main),
                stoch_d = ?stoch(Buffer::Signal),
                "tick scored"
            );
        }

        let mut report = TickReport {
            time,
            market_state,
            volume_strength,
            macd_strength,
            signal: None,
            outcome: TickOutcome::NoSignal,
            trailing_updates,
        };

        if broker.positions(self.config.magic).len() >= self.config.risk.max_positions {
            self.reject(&mut report, Rejection::PositionCap);
            return report;
        }

        let window = MarketWindow::read(
            market,
            self.handles.bands,
            self.handles.momentum,
            self.config.momentum.lookback,
        );
        let detections = Detections::scan(
            &window,
            self.config.bands.touch_threshold,
            self.config.momentum.lookback,
        );
        let Some(entry) = window.current_close() else {
            return report;
        };
        if verbose && detections.any() {
            debug!(?detections, "patterns detected");
        }

        let inputs = StrengthInputs {
            volume_strength,
            macd_strength,
            trend_filter_passed: self.trend_filter(market, entry),
        };
        let candidate = match arbiter::arbitrate(&detections, &inputs, &self.config) {
            Arbitration::Selected(candidate) => candidate,
            Arbitration::Gated { rule, base_strength } => {
                if verbose {
                    debug!(rule, base_strength, "signal gated");
                }
                return report;
            }
            Arbitration::NoPattern => return report,
        };

        let Some(stops) =
            arbiter::derive_stops(candidate.direction, entry, self.state.current_atr, &window, &self.config)
        else {
            self.reject(&mut report, Rejection::InvalidStops);
            return report;
        };

        let signal = arbiter::build_signal(&candidate, entry, stops, &inputs);
        self.state.stats.record_signal(signal.signal_type);
        if verbose {
            debug!(rule = candidate.rule, reason = %signal.reason, "signal selected");
        }
        report.outcome = self.executor.execute(&signal, &mut self.state, broker);
        report.signal = Some(signal);
        report
    }

    fn reject(&mut self, report: &mut TickReport, rejection: Rejection) {
        self.state.stats.record_rejection(&rejection);
        if self.config.verbose {
            debug!(%rejection, "tick rejected");
        }
        report.outcome = TickOutcome::Rejected(rejection);
    }

    /// Higher-timeframe trend filter. A disabled filter passes.
    fn trend_filter(&self, market: &dyn MarketData, close: f64) -> bool {
        let Some(handle) = self.handles.trend_ema else {
            return true;
        };
        if self.config.verbose {
            match require(market.indicator(handle, Buffer::Main, 1), 1) {
                Some(ema) => debug!(
                    ema = ema[0],
                    close,
                    above = close > ema[0],
                    "trend filter"
                ),
                None => debug!("trend filter EMA unavailable"),
            }
        }
        // TODO: gate longs on close > EMA and shorts on close < EMA once the
        // direction is passed in; the filter currently always passes.
        true
    }

    /// Stop the engine and return its final counters.
    pub fn shutdown(self) -> EngineStats {
        info!(stats = ?self.state.stats, "engine stopped");
        self.state.stats
    }
}
