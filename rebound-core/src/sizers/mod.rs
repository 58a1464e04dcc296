//! Position sizers: proposed baseline stake + volatility → stake.
//!
//! Sizers are signal-agnostic. They never decide whether to enter, only how
//! much. A sizer that cannot size refuses with a [`SizingError`] and the
//! entry is suppressed for that tick.

pub mod vol_target;

pub use vol_target::VolTargetSizer;

use serde::Serialize;

use crate::config::SizingConfig;
use crate::error::SizingError;

/// Volatility context at the entry candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityInput {
    pub atr: f64,
    pub close: f64,
}

impl VolatilityInput {
    /// ATR as a percentage of close.
    pub fn current_vol_pct(&self) -> f64 {
        self.atr / self.close * 100.0
    }
}

/// Sizer output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sizing {
    pub stake: f64,
    /// Applied scale (after clamping), before stake bounds and cap.
    pub scale: f64,
    pub current_vol_pct: f64,
}

pub trait StakeSizer: Send + Sync {
    fn size(&self, baseline: f64, vol: VolatilityInput) -> Result<Sizing, SizingError>;

    /// Sizer name for logs and diagnostics.
    fn name(&self) -> &str;
}

/// Passes the baseline stake through unscaled. Used when vol-targeting is
/// disabled.
#[derive(Debug, Clone, Default)]
pub struct PassThroughSizer;

impl StakeSizer for PassThroughSizer {
    fn size(&self, baseline: f64, vol: VolatilityInput) -> Result<Sizing, SizingError> {
        check_baseline(baseline)?;
        Ok(Sizing {
            stake: baseline,
            scale: 1.0,
            current_vol_pct: vol.current_vol_pct(),
        })
    }

    fn name(&self) -> &str {
        "pass_through"
    }
}

/// Sizer selected by the `[sizing]` section.
pub fn sizer_from_config(config: &SizingConfig) -> Box<dyn StakeSizer> {
    if config.enabled {
        Box::new(VolTargetSizer::new(config.clone()))
    } else {
        Box::new(PassThroughSizer)
    }
}

pub(crate) fn check_baseline(baseline: f64) -> Result<(), SizingError> {
    if baseline.is_finite() && baseline > 0.0 {
        Ok(())
    } else {
        Err(SizingError::InvalidBaseline(baseline))
    }
}
