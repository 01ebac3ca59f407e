//! Engine configuration.
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes. The configuration is validated once when the engine starts and
//! is immutable afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Timeframe;
use crate::fingerprint;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Strategy id used to attribute positions to this engine.
    pub magic: u64,
    /// Emit per-tick diagnostics at debug level.
    pub verbose: bool,
    pub bands: BandsConfig,
    pub momentum: MomentumConfig,
    pub volume: VolumeConfig,
    pub macd: MacdConfig,
    pub rsi: RsiConfig,
    pub stochastic: StochasticConfig,
    pub trend_filter: TrendFilterConfig,
    pub signals: SignalsConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub trailing: TrailingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::M15,
            magic: 240_101,
            verbose: false,
            bands: BandsConfig::default(),
            momentum: MomentumConfig::default(),
            volume: VolumeConfig::default(),
            macd: MacdConfig::default(),
            rsi: RsiConfig::default(),
            stochastic: StochasticConfig::default(),
            trend_filter: TrendFilterConfig::default(),
            signals: SignalsConfig::default(),
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
            trailing: TrailingConfig::default(),
        }
    }
}

/// Bollinger envelope and the thresholds derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandsConfig {
    pub period: usize,
    pub deviation: f64,
    /// Fraction of the band a close must reach to count as a touch.
    pub touch_threshold: f64,
    /// Width ratio below which the market is in a squeeze.
    pub squeeze_threshold: f64,
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            period: 20,
            deviation: 2.0,
            touch_threshold: 0.95,
            squeeze_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub period: usize,
    /// Bars (excluding the current one) scanned for the breakout high/low.
    pub lookback: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self { period: 14, lookback: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub ma_period: usize,
    /// Minimum volume strength for a band breakout.
    pub threshold: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            ma_period: 20,
            threshold: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdConfig {
    pub enabled: bool,
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    pub period: usize,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self { period: 14 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StochasticConfig {
    pub k_period: usize,
    pub d_period: usize,
    pub slowing: usize,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        Self {
            k_period: 5,
            d_period: 3,
            slowing: 3,
        }
    }
}

/// Higher-timeframe EMA filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendFilterConfig {
    pub enabled: bool,
    pub timeframe: Timeframe,
    pub ema_period: usize,
}

impl Default for TrendFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeframe: Timeframe::H1,
            ema_period: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    pub use_bb_breakout: bool,
    pub use_bb_touch: bool,
    pub use_momentum_breakout: bool,
    pub allow_short: bool,
    pub min_signal_strength: f64,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            use_bb_breakout: true,
            use_bb_touch: true,
            use_momentum_breakout: true,
            allow_short: true,
            min_signal_strength: 0.55,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Percent of balance risked per trade, in (0, 100].
    pub risk_percent: f64,
    pub max_positions: usize,
    /// Derive SL/TP from ATR instead of the band extremes.
    pub dynamic_sltp: bool,
    pub atr_period: usize,
    pub sl_atr_multiplier: f64,
    pub tp_atr_multiplier: f64,
    /// Lot size used when the sizing inputs are degenerate.
    pub fallback_lot: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_percent: 1.0,
            max_positions: 1,
            dynamic_sltp: true,
            atr_period: 14,
            sl_atr_multiplier: 2.0,
            tp_atr_multiplier: 3.0,
            fallback_lot: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Widest spread, in points, at which orders are still sent.
    pub max_spread_points: u32,
    /// Minimum bars between two executions.
    pub min_bars_between: u32,
    /// Close positions opposing a new signal before opening it.
    pub close_opposite: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_spread_points: 30,
            min_bars_between: 3,
            close_opposite: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingConfig {
    pub enabled: bool,
    pub atr_multiplier: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            atr_multiplier: 1.5,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// BLAKE3 hex digest of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        fingerprint::config_hash(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol", "must not be empty"));
        }

        let periods = [
            ("bands.period", self.bands.period),
            ("momentum.period", self.momentum.period),
            ("momentum.lookback", self.momentum.lookback),
            ("volume.ma_period", self.volume.ma_period),
            ("macd.fast", self.macd.fast),
            ("macd.signal", self.macd.signal),
            ("rsi.period", self.rsi.period),
            ("stochastic.k_period", self.stochastic.k_period),
            ("stochastic.d_period", self.stochastic.d_period),
            ("stochastic.slowing", self.stochastic.slowing),
            ("trend_filter.ema_period", self.trend_filter.ema_period),
            ("risk.atr_period", self.risk.atr_period),
            ("risk.max_positions", self.risk.max_positions),
        ];
        for (field, value) in periods {
            if value == 0 {
                return Err(invalid(field, "must be >= 1"));
            }
        }
        if self.macd.slow <= self.macd.fast {
            return Err(invalid("macd.slow", "must exceed macd.fast"));
        }

        let positive = [
            ("bands.deviation", self.bands.deviation),
            ("bands.squeeze_threshold", self.bands.squeeze_threshold),
            ("risk.sl_atr_multiplier", self.risk.sl_atr_multiplier),
            ("risk.tp_atr_multiplier", self.risk.tp_atr_multiplier),
            ("risk.fallback_lot", self.risk.fallback_lot),
            ("trailing.atr_multiplier", self.trailing.atr_multiplier),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("must be > 0, got {value}")));
            }
        }

        if !(self.bands.touch_threshold > 0.0 && self.bands.touch_threshold <= 1.0) {
            return Err(invalid(
                "bands.touch_threshold",
                format!("must be in (0, 1], got {}", self.bands.touch_threshold),
            ));
        }
        if !(self.risk.risk_percent > 0.0 && self.risk.risk_percent <= 100.0) {
            return Err(invalid(
                "risk.risk_percent",
                format!("must be in (0, 100], got {}", self.risk.risk_percent),
            ));
        }
        if !self.volume.threshold.is_finite() || self.volume.threshold < 0.0 {
            return Err(invalid("volume.threshold", "must be >= 0"));
        }
        if !self.signals.min_signal_strength.is_finite() {
            return Err(invalid("signals.min_signal_strength", "must be finite"));
        }
        if self.trend_filter.enabled && self.trend_filter.timeframe < self.timeframe {
            return Err(invalid(
                "trend_filter.timeframe",
                format!("{} is finer than the chart timeframe {}", self.trend_filter.timeframe, self.timeframe),
            ));
        }
        Ok(())
    }
}
