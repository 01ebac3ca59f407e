use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Instrument metadata as reported by the execution backend.
///
/// `point` is the quoting unit spreads are expressed in; `tick_size` and
/// `tick_value` give the account-currency value of one minimal price move
/// for one lot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolSpec {
    pub symbol: String,
    pub point: f64,
    pub tick_size: f64,
    pub tick_value: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
}

impl SymbolSpec {
    /// Five-digit FX major: point = tick = 0.00001, 1 lot = 100k units.
    pub fn forex_major(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            point: 0.00001,
            tick_size: 0.00001,
            tick_value: 1.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
        }
    }

    /// Round a price to the nearest valid tick. A zero tick size leaves it as is.
    pub fn normalize_price(&self, price: f64) -> f64 {
        if self.tick_size <= 0.0 {
            return price;
        }
        (price / self.tick_size).round() * self.tick_size
    }

    /// Floor a raw lot size to the volume step, then clamp to `[volume_min, volume_max]`.
    pub fn normalize_volume(&self, lots: f64) -> f64 {
        let stepped = if self.volume_step > 0.0 {
            // Guard against 0.3 / 0.1 = 2.9999999 flooring a whole step away.
            let steps = (lots / self.volume_step + 1e-9).floor();
            steps * self.volume_step
        } else {
            lots
        };
        stepped.clamp(self.volume_min, self.volume_max)
    }

    /// Validate that a volume is within limits and aligned to the step.
    pub fn validate_volume(&self, volume: f64) -> Result<f64, InstrumentError> {
        if !(self.volume_min..=self.volume_max).contains(&volume) {
            return Err(InstrumentError::VolumeOutOfRange {
                volume,
                min: self.volume_min,
                max: self.volume_max,
            });
        }
        if self.volume_step > 0.0 {
            let steps = volume / self.volume_step;
            if (steps - steps.round()).abs() > 1e-6 {
                return Err(InstrumentError::InvalidVolumeStep {
                    volume,
                    step: self.volume_step,
                });
            }
        }
        Ok(volume)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InstrumentError {
    #[error("Volume {volume} outside [{min}, {max}]")]
    VolumeOutOfRange { volume: f64, min: f64, max: f64 },

    #[error("Volume {volume} does not respect volume_step {step}")]
    InvalidVolumeStep { volume: f64, step: f64 },
}
