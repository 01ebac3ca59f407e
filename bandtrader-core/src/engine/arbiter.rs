//! Signal arbiter.
//!
//! Rules are evaluated top-down; the first rule whose pattern is present
//! claims the tick. If the claiming rule's gates fail, no lower rule is
//! consulted, so a breakout tick can never turn into a touch or momentum
//! signal.

use crate::config::EngineConfig;
use crate::domain::{Direction, SignalType, TradeSignal};

use super::detectors::{Detections, MarketWindow};

/// Weight of the trend-filter term in the base strength.
pub const TREND_FILTER_BONUS: f64 = 0.3;

/// Inputs the arbiter scores a tick with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrengthInputs {
    pub volume_strength: f64,
    pub macd_strength: f64,
    pub trend_filter_passed: bool,
}

impl StrengthInputs {
    pub fn base_strength(&self) -> f64 {
        let bonus = if self.trend_filter_passed { TREND_FILTER_BONUS } else { 0.0 };
        0.3 * self.volume_strength + 0.4 * self.macd_strength + 0.3 * bonus
    }
}

/// One entry of the priority list.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub signal_type: SignalType,
    /// Pattern and toggle check; returns the direction when the rule applies.
    pub pattern: fn(&Detections, &EngineConfig) -> Option<Direction>,
    /// Amount subtracted from `min_signal_strength` for this rule.
    pub relax: f64,
    /// Multiplier applied to the base strength.
    pub discount: f64,
    pub needs_volume: bool,
}

impl Rule {
    fn gates_pass(&self, direction: Direction, inputs: &StrengthInputs, config: &EngineConfig) -> bool {
        let base = inputs.base_strength();
        if self.needs_volume && inputs.volume_strength < config.volume.threshold {
            return false;
        }
        if base < config.signals.min_signal_strength - self.relax {
            return false;
        }
        match self.signal_type {
            SignalType::MomentumBreak => direction == Direction::Long || config.signals.allow_short,
            _ => true,
        }
    }
}

fn bull_breakout(d: &Detections, c: &EngineConfig) -> Option<Direction> {
    (c.signals.use_bb_breakout && d.breakout == Some(Direction::Long)).then_some(Direction::Long)
}

fn bear_breakout(d: &Detections, c: &EngineConfig) -> Option<Direction> {
    (c.signals.use_bb_breakout && c.signals.allow_short && d.breakout == Some(Direction::Short))
        .then_some(Direction::Short)
}

fn touch(d: &Detections, c: &EngineConfig) -> Option<Direction> {
    d.touch
        .filter(|&dir| c.signals.use_bb_touch && (dir == Direction::Long || c.signals.allow_short))
}

fn momentum(d: &Detections, c: &EngineConfig) -> Option<Direction> {
    d.momentum.filter(|_| c.signals.use_momentum_breakout)
}

/// Priority order, highest first.
pub const RULES: [Rule; 4] = [
    Rule {
        name: "bull_breakout",
        signal_type: SignalType::BbBreakout,
        pattern: bull_breakout,
        relax: 0.0,
        discount: 1.0,
        needs_volume: true,
    },
    Rule {
        name: "bear_breakout",
        signal_type: SignalType::BbBreakout,
        pattern: bear_breakout,
        relax: 0.0,
        discount: 1.0,
        needs_volume: true,
    },
    Rule {
        name: "band_touch",
        signal_type: SignalType::BbTouch,
        pattern: touch,
        relax: 0.1,
        discount: 0.85,
        needs_volume: false,
    },
    Rule {
        name: "momentum_breakout",
        signal_type: SignalType::MomentumBreak,
        pattern: momentum,
        relax: 0.05,
        discount: 0.8,
        needs_volume: false,
    },
];

/// Direction, type and strength chosen for this tick, before stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub rule: &'static str,
    pub direction: Direction,
    pub signal_type: SignalType,
    pub strength: f64,
}

/// Outcome of walking the rule list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arbitration {
    /// No rule's pattern was present.
    NoPattern,
    /// The claiming rule's gates failed.
    Gated { rule: &'static str, base_strength: f64 },
    Selected(Candidate),
}

pub fn arbitrate(detections: &Detections, inputs: &StrengthInputs, config: &EngineConfig) -> Arbitration {
    let base = inputs.base_strength();
    for rule in &RULES {
        let Some(direction) = (rule.pattern)(detections, config) else {
            continue;
        };
        if !rule.gates_pass(direction, inputs, config) {
            return Arbitration::Gated {
                rule: rule.name,
                base_strength: base,
            };
        }
        return Arbitration::Selected(Candidate {
            rule: rule.name,
            direction,
            signal_type: rule.signal_type,
            strength: base * rule.discount,
        });
    }
    Arbitration::NoPattern
}

/// Stop-loss and take-profit for an entry, or `None` when the stop would not
/// sit on the losing side of the entry.
///
/// ATR mode places both levels at fixed ATR multiples. Band mode stops at the
/// opposite band and targets twice the risk.
pub fn derive_stops(
    direction: Direction,
    entry: f64,
    atr: f64,
    window: &MarketWindow,
    config: &EngineConfig,
) -> Option<(f64, f64)> {
    let sign = direction.sign();
    let (stop_loss, take_profit) = if config.risk.dynamic_sltp {
        (
            entry - sign * atr * config.risk.sl_atr_multiplier,
            entry + sign * atr * config.risk.tp_atr_multiplier,
        )
    } else {
        let stop_loss = match direction {
            Direction::Long => window.lower.as_ref()?[0],
            Direction::Short => window.upper.as_ref()?[0],
        };
        let risk = (entry - stop_loss) * sign;
        (stop_loss, entry + sign * 2.0 * risk)
    };
    let risk = (entry - stop_loss) * sign;
    (risk > 0.0 && risk.is_finite()).then_some((stop_loss, take_profit))
}

/// Assemble the final signal.
pub fn build_signal(
    candidate: &Candidate,
    entry: f64,
    stops: (f64, f64),
    inputs: &StrengthInputs,
) -> TradeSignal {
    let reason = format!(
        "{} {} str={:.2} vol={:.2} macd={:.2}",
        candidate.signal_type,
        candidate.direction,
        candidate.strength,
        inputs.volume_strength,
        inputs.macd_strength,
    );
    TradeSignal {
        direction: candidate.direction,
        signal_type: candidate.signal_type,
        strength: candidate.strength,
        entry_price: entry,
        stop_loss: stops.0,
        take_profit: stops.1,
        volume_strength: inputs.volume_strength,
        macd_strength: inputs.macd_strength,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    fn inputs(vol: f64, macd: f64) -> StrengthInputs {
        StrengthInputs {
            volume_strength: vol,
            macd_strength: macd,
            trend_filter_passed: true,
        }
    }

    fn detections(
        breakout: Option<Direction>,
        touch: Option<Direction>,
        momentum: Option<Direction>,
    ) -> Detections {
        Detections { breakout, touch, momentum }
    }

    fn selected(a: Arbitration) -> Candidate {
        match a {
            Arbitration::Selected(c) => c,
            other => panic!("expected a candidate, got {other:?}"),
        }
    }

    #[test]
    fn base_strength_weights() {
        assert_approx(inputs(1.5, 0.8).base_strength(), 0.45 + 0.32 + 0.09, 1e-12);
        let no_trend = StrengthInputs { trend_filter_passed: false, ..inputs(1.5, 0.8) };
        assert_approx(no_trend.base_strength(), 0.77, 1e-12);
    }

    #[test]
    fn breakout_beats_touch_and_momentum() {
        let config = EngineConfig::default();
        let d = detections(Some(Direction::Long), Some(Direction::Short), Some(Direction::Short));
        let c = selected(arbitrate(&d, &inputs(1.5, 0.8), &config));
        assert_eq!(c.signal_type, SignalType::BbBreakout);
        assert_eq!(c.direction, Direction::Long);
    }

    #[test]
    fn gated_breakout_blocks_lower_rules() {
        let config = EngineConfig::default();
        let d = detections(Some(Direction::Long), Some(Direction::Long), None);
        // volume below threshold
        let a = arbitrate(&d, &inputs(0.9, 0.9), &config);
        assert!(matches!(a, Arbitration::Gated { rule: "bull_breakout", .. }));
    }

    #[test]
    fn bear_breakout_needs_shorts() {
        let mut config = EngineConfig::default();
        let d = detections(Some(Direction::Short), None, None);
        assert_eq!(selected(arbitrate(&d, &inputs(1.5, 0.8), &config)).direction, Direction::Short);
        config.signals.allow_short = false;
        assert_eq!(arbitrate(&d, &inputs(1.5, 0.8), &config), Arbitration::NoPattern);
    }

    #[test]
    fn touch_discount_and_relaxed_gate() {
        let config = EngineConfig::default();
        let i = StrengthInputs { volume_strength: 0.5, macd_strength: 0.6, trend_filter_passed: true };
        // base = 0.15 + 0.24 + 0.09 = 0.48, above 0.55 - 0.1
        let c = selected(arbitrate(&detections(None, Some(Direction::Long), None), &i, &config));
        assert_eq!(c.signal_type, SignalType::BbTouch);
        assert_approx(c.strength, 0.85 * i.base_strength(), 1e-12);
    }

    #[test]
    fn short_touch_needs_shorts() {
        let mut config = EngineConfig::default();
        let d = detections(None, Some(Direction::Short), None);
        assert_eq!(selected(arbitrate(&d, &inputs(1.5, 0.8), &config)).direction, Direction::Short);
        config.signals.allow_short = false;
        assert_eq!(arbitrate(&d, &inputs(1.5, 0.8), &config), Arbitration::NoPattern);
        let long = detections(None, Some(Direction::Long), None);
        assert_eq!(selected(arbitrate(&long, &inputs(1.5, 0.8), &config)).signal_type, SignalType::BbTouch);
    }

    #[test]
    fn momentum_discount_and_short_gate() {
        let mut config = EngineConfig::default();
        let i = inputs(1.0, 0.7);
        let d = detections(None, None, Some(Direction::Short));
        let c = selected(arbitrate(&d, &i, &config));
        assert_eq!(c.signal_type, SignalType::MomentumBreak);
        assert_approx(c.strength, 0.8 * i.base_strength(), 1e-12);
        config.signals.allow_short = false;
        assert!(matches!(arbitrate(&d, &i, &config), Arbitration::Gated { .. }));
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut config = EngineConfig::default();
        config.signals.use_bb_breakout = false;
        let d = detections(Some(Direction::Long), None, Some(Direction::Long));
        let c = selected(arbitrate(&d, &inputs(1.5, 0.8), &config));
        assert_eq!(c.signal_type, SignalType::MomentumBreak);
    }

    #[test]
    fn atr_stops() {
        let config = EngineConfig::default();
        let w = MarketWindow::default();
        let (sl, tp) = derive_stops(Direction::Long, 1.1, 0.001, &w, &config).unwrap();
        assert_approx(sl, 1.098, 1e-12);
        assert_approx(tp, 1.103, 1e-12);
        let (sl, tp) = derive_stops(Direction::Short, 1.1, 0.001, &w, &config).unwrap();
        assert_approx(sl, 1.102, 1e-12);
        assert_approx(tp, 1.097, 1e-12);
        assert!(derive_stops(Direction::Long, 1.1, 0.0, &w, &config).is_none());
    }

    #[test]
    fn band_stops_two_to_one() {
        let mut config = EngineConfig::default();
        config.risk.dynamic_sltp = false;
        let w = MarketWindow {
            upper: Some(vec![105.0, 105.0]),
            lower: Some(vec![95.0, 95.0]),
            ..MarketWindow::default()
        };
        assert_eq!(derive_stops(Direction::Long, 100.0, 0.0, &w, &config), Some((95.0, 110.0)));
        assert_eq!(derive_stops(Direction::Short, 100.0, 0.0, &w, &config), Some((105.0, 90.0)));
        // breakout above the upper band, stop at the lower band is still valid
        assert_eq!(derive_stops(Direction::Long, 110.0, 0.0, &w, &config), Some((95.0, 140.0)));
        // short entry above the upper band: stop on the wrong side
        assert!(derive_stops(Direction::Short, 110.0, 0.0, &w, &config).is_none());
    }

    #[test]
    fn signal_reason() {
        let c = Candidate {
            rule: "bull_breakout",
            direction: Direction::Long,
            signal_type: SignalType::BbBreakout,
            strength: 0.86,
        };
        let s = build_signal(&c, 110.0, (108.0, 113.0), &inputs(1.5, 0.8));
        assert!(s.reason.starts_with("BBBreakout"));
        assert!(s.has_valid_stops());
        assert_eq!(s.entry_price, 110.0);
    }
}
