//! End-to-end engine tests against a snapshot feed and the paper broker.
//!
//! Tests:
//! 1. Round-trip breakout: a clean upper-band cross becomes an executed long
//! 2. Priority: breakout wins over touch and momentum on the same tick
//! 3. Strength discounts for touch (x0.85) and momentum (x0.8) signals
//! 4. Position cap blocks signal generation
//! 5. Cooldown boundary: one bar short is rejected, exactly enough passes
//! 6. Volume window of exactly ma_period samples is neutral
//! 7. Trailing stop ratchet and ATR retention on short reads
//! 8. Fatal initialization

use bandtrader_core::broker::{Broker, OrderRequest, PaperBroker};
use bandtrader_core::domain::{Direction, Quote, SignalType, SymbolSpec};
use bandtrader_core::engine::{GateState, Rejection, StrengthInputs};
use bandtrader_core::market::{Buffer, IndicatorKind, PriceField, SnapshotFeed};
use bandtrader_core::{Engine, EngineConfig, EngineError, TickOutcome, TickReport};
use chrono::{DateTime, Duration, TimeZone, Utc};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn spec() -> SymbolSpec {
    SymbolSpec {
        symbol: "TEST".into(),
        point: 0.01,
        tick_size: 0.01,
        tick_value: 1.0,
        volume_min: 0.01,
        volume_max: 100.0,
        volume_step: 0.01,
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        symbol: "TEST".into(),
        ..EngineConfig::default()
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

fn broker() -> PaperBroker {
    let mut broker = PaperBroker::new(spec(), 10_000.0);
    set_quote(&mut broker, t0(), 110.0);
    broker
}

fn set_quote(broker: &mut PaperBroker, time: DateTime<Utc>, bid: f64) {
    broker.set_quote(Quote { time, bid, ask: bid + 0.05 });
}

/// Flat bands at 95/105, MACD strength 0.8, volume spike on the current bar.
fn feed(close0: f64, close1: f64, momentum: [f64; 3]) -> SnapshotFeed {
    let close = vec![close0, close1, 100.2, 99.8, 100.1, 99.9, 100.0, 100.0, 100.0, 100.0];
    let mut feed = SnapshotFeed::new();
    feed.set_prices(PriceField::Close, close.clone());
    feed.set_prices(PriceField::High, close.iter().map(|c| c + 0.5).collect());
    feed.set_prices(PriceField::Low, close.iter().map(|c| c - 0.5).collect());
    feed.set_indicator(IndicatorKind::Bands, Buffer::Upper, vec![105.0; 10]);
    feed.set_indicator(IndicatorKind::Bands, Buffer::Middle, vec![100.0; 10]);
    feed.set_indicator(IndicatorKind::Bands, Buffer::Lower, vec![95.0; 10]);
    feed.set_indicator(IndicatorKind::Momentum, Buffer::Main, momentum.to_vec());
    feed.set_indicator(IndicatorKind::Rsi, Buffer::Main, vec![50.0]);
    feed.set_indicator(IndicatorKind::Atr, Buffer::Main, vec![2.0]);
    feed.set_indicator(IndicatorKind::Macd, Buffer::Main, vec![0.3, 0.2, 0.1]);
    feed.set_indicator(IndicatorKind::Macd, Buffer::Signal, vec![0.1, 0.1, 0.1]);
    feed.set_indicator(IndicatorKind::Macd, Buffer::Histogram, vec![0.0, 0.0, 0.0]);
    let mut volume = vec![100.0; 25];
    volume[0] = 200.0;
    feed.set_tick_volume(volume);
    feed
}

const FLAT_MOMENTUM: [f64; 3] = [100.2, 100.1, 100.3];
const RISING_MOMENTUM: [f64; 3] = [101.0, 100.8, 100.6];

fn breakout_feed() -> SnapshotFeed {
    feed(110.0, 100.0, FLAT_MOMENTUM)
}

fn base_strength(report: &TickReport) -> f64 {
    StrengthInputs {
        volume_strength: report.volume_strength,
        macd_strength: report.macd_strength,
        trend_filter_passed: true,
    }
    .base_strength()
}

fn approx(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

// ──────────────────────────────────────────────
// 1. Round trip
// ──────────────────────────────────────────────

#[test]
fn breakout_round_trip_executes_long() {
    let mut feed = breakout_feed();
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();

    let report = engine.on_tick(&feed, &mut broker);

    assert!(report.volume_strength >= 1.0);
    approx(report.macd_strength, 0.8);
    let signal = report.signal.expect("breakout signal");
    assert_eq!(signal.direction, Direction::Long);
    assert_eq!(signal.signal_type, SignalType::BbBreakout);
    assert_eq!(signal.entry_price, 110.0);
    approx(signal.stop_loss, 106.0);
    approx(signal.take_profit, 116.0);
    assert!(signal.strength >= config().signals.min_signal_strength);

    // 1% of 10k over 400 ticks of 1.0 per lot
    match report.outcome {
        TickOutcome::Executed { ticket, volume } => {
            approx(volume, 0.25);
            let position = &broker.positions(config().magic)[0];
            assert_eq!(position.ticket, ticket);
            assert_eq!(position.comment, signal.reason);
            assert_eq!(position.stop_loss, Some(106.0));
        }
        other => panic!("expected execution, got {other:?}"),
    }
    assert_eq!(engine.last_trade_time(), Some(t0()));
    assert_eq!(engine.gate_state(), GateState::Idle);
    assert_eq!(engine.stats().signals_breakout, 1);
    assert_eq!(engine.stats().executions, 1);
}

#[test]
fn bearish_breakout_executes_short() {
    let mut feed = feed(90.0, 100.0, FLAT_MOMENTUM);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();
    set_quote(&mut broker, t0(), 90.0);

    let report = engine.on_tick(&feed, &mut broker);
    let signal = report.signal.expect("short breakout");
    assert_eq!(signal.direction, Direction::Short);
    approx(signal.stop_loss, 94.0);
    approx(signal.take_profit, 84.0);
    assert!(matches!(report.outcome, TickOutcome::Executed { .. }));
}

// ──────────────────────────────────────────────
// 2-3. Priority and strength discounts
// ──────────────────────────────────────────────

#[test]
fn breakout_beats_touch_and_momentum() {
    // close1 95.2 sits in the lower touch zone; momentum is rising too
    let mut feed = feed(110.0, 95.2, RISING_MOMENTUM);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();

    let report = engine.on_tick(&feed, &mut broker);
    let signal = report.signal.clone().expect("signal");
    assert_eq!(signal.signal_type, SignalType::BbBreakout);
    approx(signal.strength, base_strength(&report));
}

#[test]
fn touch_strength_is_discounted() {
    let mut feed = feed(97.0, 95.2, FLAT_MOMENTUM);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();
    set_quote(&mut broker, t0(), 97.0);

    let report = engine.on_tick(&feed, &mut broker);
    let signal = report.signal.clone().expect("touch signal");
    assert_eq!(signal.signal_type, SignalType::BbTouch);
    assert_eq!(signal.direction, Direction::Long);
    approx(signal.strength, 0.85 * base_strength(&report));
}

#[test]
fn short_touch_respects_long_only_config() {
    // close1 104.8 sits in the upper touch zone, close0 turns down
    let mut feed = feed(103.0, 104.8, FLAT_MOMENTUM);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut paper = broker();
    set_quote(&mut paper, t0(), 103.0);
    let report = engine.on_tick(&feed, &mut paper);
    let signal = report.signal.expect("short touch with shorts enabled");
    assert_eq!((signal.direction, signal.signal_type), (Direction::Short, SignalType::BbTouch));

    let mut long_only = config();
    long_only.signals.allow_short = false;
    let mut engine = Engine::new(long_only, &mut feed).unwrap();
    let mut paper = broker();
    set_quote(&mut paper, t0(), 103.0);
    let report = engine.on_tick(&feed, &mut paper);
    assert!(report.signal.is_none());
    assert_eq!(report.outcome, TickOutcome::NoSignal);
    assert!(paper.positions(config().magic).is_empty());
}

#[test]
fn momentum_strength_is_discounted() {
    let mut feed = feed(104.0, 100.0, RISING_MOMENTUM);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();
    set_quote(&mut broker, t0(), 104.0);

    let report = engine.on_tick(&feed, &mut broker);
    let signal = report.signal.clone().expect("momentum signal");
    assert_eq!(signal.signal_type, SignalType::MomentumBreak);
    approx(signal.strength, 0.8 * base_strength(&report));
    assert_eq!(engine.stats().signals_momentum, 1);
}

#[test]
fn no_pattern_no_signal() {
    let mut feed = feed(100.5, 100.0, FLAT_MOMENTUM);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();

    let report = engine.on_tick(&feed, &mut broker);
    assert!(report.signal.is_none());
    assert_eq!(report.outcome, TickOutcome::NoSignal);
}

// ──────────────────────────────────────────────
// 4. Position cap
// ──────────────────────────────────────────────

#[test]
fn position_cap_blocks_signals() {
    let mut feed = breakout_feed();
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();
    broker
        .open(&OrderRequest {
            symbol: "TEST".into(),
            direction: Direction::Short,
            volume: 0.1,
            stop_loss: None,
            take_profit: None,
            magic: config().magic,
            comment: "manual".into(),
        })
        .unwrap();

    let report = engine.on_tick(&feed, &mut broker);
    assert!(report.signal.is_none());
    assert_eq!(report.outcome, TickOutcome::Rejected(Rejection::PositionCap));
    assert_eq!(broker.positions(config().magic).len(), 1);
    assert_eq!(engine.stats().rejected_position_cap, 1);
}

#[test]
fn other_strategies_do_not_count_toward_cap() {
    let mut feed = breakout_feed();
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();
    broker
        .open(&OrderRequest {
            symbol: "TEST".into(),
            direction: Direction::Long,
            volume: 0.1,
            stop_loss: None,
            take_profit: None,
            magic: config().magic + 1,
            comment: String::new(),
        })
        .unwrap();

    let report = engine.on_tick(&feed, &mut broker);
    assert!(matches!(report.outcome, TickOutcome::Executed { .. }));
}

// ──────────────────────────────────────────────
// 5. Cooldown
// ──────────────────────────────────────────────

#[test]
fn cooldown_boundary() {
    let mut cfg = config();
    cfg.risk.max_positions = 5;
    let bar = cfg.timeframe.seconds();
    let min_bars = i64::from(cfg.execution.min_bars_between);
    let mut feed = breakout_feed();
    let mut engine = Engine::new(cfg, &mut feed).unwrap();
    let mut broker = broker();

    assert!(matches!(engine.on_tick(&feed, &mut broker).outcome, TickOutcome::Executed { .. }));

    set_quote(&mut broker, t0() + Duration::seconds((min_bars - 1) * bar), 110.0);
    let report = engine.on_tick(&feed, &mut broker);
    assert_eq!(
        report.outcome,
        TickOutcome::Rejected(Rejection::Cooldown {
            elapsed_secs: (min_bars - 1) * bar,
            required_secs: min_bars * bar,
        })
    );
    assert!(report.signal.is_some());
    assert_eq!(
        engine.last_gate_path(),
        &[GateState::Idle, GateState::Evaluating, GateState::Rejected, GateState::Idle]
    );

    let later = t0() + Duration::seconds(min_bars * bar);
    set_quote(&mut broker, later, 110.0);
    let report = engine.on_tick(&feed, &mut broker);
    assert!(matches!(report.outcome, TickOutcome::Executed { .. }));
    assert_eq!(engine.last_trade_time(), Some(later));
    assert_eq!(broker.positions(engine.config().magic).len(), 2);
}

#[test]
fn failed_submission_is_reported_and_retried_next_tick() {
    let mut feed = breakout_feed();
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();
    broker.fail_next_open(10006, "requote");

    let report = engine.on_tick(&feed, &mut broker);
    assert_eq!(
        report.outcome,
        TickOutcome::SubmitFailed { code: 10006, description: "requote".into() }
    );
    assert_eq!(engine.last_trade_time(), None);

    let report = engine.on_tick(&feed, &mut broker);
    assert!(matches!(report.outcome, TickOutcome::Executed { .. }));
}

// ──────────────────────────────────────────────
// 6. Data insufficiency
// ──────────────────────────────────────────────

#[test]
fn volume_window_of_exactly_ma_period_is_neutral() {
    let mut feed = breakout_feed();
    let mut volume = vec![100.0; config().volume.ma_period];
    volume[0] = 200.0;
    feed.set_tick_volume(volume);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();

    let report = engine.on_tick(&feed, &mut broker);
    assert_eq!(report.volume_strength, 0.5);
    // 0.5 is below the breakout volume threshold
    assert!(report.signal.is_none());
    assert_eq!(report.outcome, TickOutcome::NoSignal);
}

#[test]
fn short_band_history_fails_soft() {
    let mut feed = breakout_feed();
    feed.set_indicator(IndicatorKind::Bands, Buffer::Upper, vec![105.0]);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();

    let report = engine.on_tick(&feed, &mut broker);
    assert_eq!(report.market_state, bandtrader_core::domain::MarketState::Ranging);
    assert!(report.signal.is_none());
}

#[test]
fn zero_atr_stops_are_rejected() {
    let mut feed = breakout_feed();
    feed.set_indicator(IndicatorKind::Atr, Buffer::Main, vec![0.0]);
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();

    let report = engine.on_tick(&feed, &mut broker);
    assert!(report.signal.is_none());
    assert_eq!(report.outcome, TickOutcome::Rejected(Rejection::InvalidStops));
    assert!(broker.positions(config().magic).is_empty());
}

// ──────────────────────────────────────────────
// 7. Trailing
// ──────────────────────────────────────────────

#[test]
fn trailing_ratchets_and_keeps_last_atr() {
    let mut feed = breakout_feed();
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();
    let ticket = broker
        .open(&OrderRequest {
            symbol: "TEST".into(),
            direction: Direction::Long,
            volume: 0.1,
            stop_loss: Some(100.0),
            take_profit: Some(130.0),
            magic: config().magic,
            comment: String::new(),
        })
        .unwrap();

    // bid 110 - 2.0 * 1.5 = 107
    let report = engine.on_tick(&feed, &mut broker);
    assert_eq!(report.trailing_updates.len(), 1);
    approx(report.trailing_updates[0].stop_loss, 107.0);
    assert_eq!(report.trailing_updates[0].ticket, ticket);

    // ATR read comes back empty: the last value is kept
    feed.set_indicator(IndicatorKind::Atr, Buffer::Main, Vec::new());
    set_quote(&mut broker, t0() + Duration::minutes(15), 112.0);
    let report = engine.on_tick(&feed, &mut broker);
    assert_eq!(engine.current_atr(), 2.0);
    approx(report.trailing_updates[0].stop_loss, 109.0);

    // price falls back: the stop stays
    set_quote(&mut broker, t0() + Duration::minutes(30), 109.5);
    let report = engine.on_tick(&feed, &mut broker);
    assert!(report.trailing_updates.is_empty());
    approx(broker.positions(config().magic)[0].stop_loss.unwrap(), 109.0);
    assert_eq!(engine.stats().trailing_modifications, 2);
}

#[test]
fn trailing_disabled_is_noop() {
    let mut cfg = config();
    cfg.trailing.enabled = false;
    let mut feed = breakout_feed();
    let mut engine = Engine::new(cfg, &mut feed).unwrap();
    let mut broker = broker();
    broker
        .open(&OrderRequest {
            symbol: "TEST".into(),
            direction: Direction::Long,
            volume: 0.1,
            stop_loss: Some(100.0),
            take_profit: None,
            magic: config().magic,
            comment: String::new(),
        })
        .unwrap();

    let report = engine.on_tick(&feed, &mut broker);
    assert!(report.trailing_updates.is_empty());
}

// ──────────────────────────────────────────────
// 8. Initialization and lifecycle
// ──────────────────────────────────────────────

#[test]
fn missing_indicator_is_fatal() {
    let mut feed = breakout_feed();
    feed.fail_attach(IndicatorKind::Macd);
    match Engine::new(config(), &mut feed) {
        Err(EngineError::IndicatorUnavailable { kind, .. }) => assert_eq!(kind, IndicatorKind::Macd),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("engine must not start without MACD"),
    }
}

#[test]
fn trend_ema_attached_only_when_enabled() {
    let mut feed = breakout_feed();
    feed.fail_attach(IndicatorKind::Ema);
    assert!(Engine::new(config(), &mut feed).is_ok());

    let mut cfg = config();
    cfg.trend_filter.enabled = true;
    assert!(matches!(
        Engine::new(cfg, &mut feed),
        Err(EngineError::IndicatorUnavailable { kind: IndicatorKind::Ema, .. })
    ));
}

#[test]
fn enabled_trend_filter_passes() {
    let mut cfg = config();
    cfg.trend_filter.enabled = true;
    cfg.verbose = true;
    let mut feed = breakout_feed();
    feed.set_indicator(IndicatorKind::Ema, Buffer::Main, vec![120.0]);
    let mut engine = Engine::new(cfg, &mut feed).unwrap();
    let mut broker = broker();

    let report = engine.on_tick(&feed, &mut broker);
    let signal = report.signal.clone().expect("signal");
    approx(signal.strength, base_strength(&report));
}

#[test]
fn invalid_config_is_fatal() {
    let mut cfg = config();
    cfg.risk.risk_percent = -1.0;
    let mut feed = breakout_feed();
    assert!(matches!(Engine::new(cfg, &mut feed), Err(EngineError::Config(_))));
}

#[test]
fn shutdown_returns_stats() {
    let mut feed = breakout_feed();
    let mut engine = Engine::new(config(), &mut feed).unwrap();
    let mut broker = broker();
    engine.on_tick(&feed, &mut broker);
    engine.on_tick(&feed, &mut broker);
    let stats = engine.shutdown();
    assert_eq!(stats.ticks, 2);
    assert_eq!(stats.executions, 1);
    assert_eq!(stats.rejected_position_cap, 1);
}
