//! Replay harness: drives the engine bar by bar against the paper broker.

use anyhow::Result;
use bandtrader_core::broker::{Broker, ClosedTrade, PaperBroker};
use bandtrader_core::domain::{Bar, SymbolSpec};
use bandtrader_core::engine::EngineStats;
use bandtrader_core::market::ReplayFeed;
use bandtrader_core::{Engine, EngineConfig};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub fingerprint: String,
    pub symbol: String,
    pub bars: usize,
    pub stats: EngineStats,
    pub closed_trades: usize,
    pub win_rate: f64,
    pub net_pnl: f64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub final_equity: f64,
    pub open_positions: usize,
    pub trades: Vec<ClosedTrade>,
}

/// One tick per bar close: bid = close, ask = close + spread.
pub fn run_replay(
    config: EngineConfig,
    bars: Vec<Bar>,
    balance: f64,
    spread_points: u32,
) -> Result<ReplaySummary> {
    let spec = SymbolSpec::forex_major(config.symbol.clone());
    let spread = f64::from(spread_points) * spec.point;
    let magic = config.magic;
    let symbol = config.symbol.clone();

    let bar_count = bars.len();
    let mut feed = ReplayFeed::new(bars, config.timeframe);
    let mut engine = Engine::new(config, &mut feed)?;
    let mut broker = PaperBroker::new(spec, balance);

    for index in 0..bar_count {
        feed.seek(index);
        let Some(bar) = feed.current_bar().cloned() else {
            break;
        };
        for trade in broker.apply_bar(&bar, spread) {
            info!(
                ticket = trade.ticket,
                reason = ?trade.reason,
                price = trade.close_price,
                profit = trade.profit,
                "position closed"
            );
        }
        engine.on_tick(&feed, &mut broker);
    }

    let fingerprint = engine.fingerprint().to_string();
    let stats = engine.shutdown();
    let trades = broker.closed_trades().to_vec();
    let wins = trades.iter().filter(|t| t.is_win()).count();
    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins as f64 / trades.len() as f64
    };
    let account = broker.account();

    Ok(ReplaySummary {
        fingerprint,
        symbol,
        bars: bar_count,
        stats,
        closed_trades: trades.len(),
        win_rate,
        net_pnl: trades.iter().map(|t| t.profit).sum(),
        initial_balance: balance,
        final_balance: account.balance,
        final_equity: account.equity,
        open_positions: broker.positions(magic).len(),
        trades,
    })
}
