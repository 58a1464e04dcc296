//! Vol-target sizer.
//!
//! # Formula
//! ```text
//! current_vol = ATR / close × 100
//! scale       = clamp(target_vol / current_vol, scale_min, scale_max)
//! stake       = baseline × scale
//! stake       = clamp to [min_stake, max_stake] when configured
//! stake       = min(stake, max_stake_multiple × baseline)
//! ```
//!
//! # Example
//! - Baseline: 100, target 1.5%
//! - ATR 3.0 on close 100 → current_vol 3% → scale 0.5 → stake 50
//! - ATR 0.5 on close 100 → current_vol 0.5% → scale 3.0 clamped to 1.5 → 150

use super::{check_baseline, Sizing, StakeSizer, VolatilityInput};
use crate::config::SizingConfig;
use crate::error::SizingError;

#[derive(Debug, Clone)]
pub struct VolTargetSizer {
    config: SizingConfig,
}

impl VolTargetSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }
}

impl StakeSizer for VolTargetSizer {
    fn size(&self, baseline: f64, vol: VolatilityInput) -> Result<Sizing, SizingError> {
        check_baseline(baseline)?;

        let current_vol_pct = vol.current_vol_pct();
        if !current_vol_pct.is_finite() || current_vol_pct <= 0.0 {
            return Err(SizingError::DegenerateVolatility {
                current_vol_pct,
                atr: vol.atr,
                close: vol.close,
            });
        }

        let c = &self.config;
        let scale = (c.target_vol_pct / current_vol_pct).clamp(c.scale_min, c.scale_max);

        let mut stake = baseline * scale;
        if let Some(min) = c.min_stake {
            stake = stake.max(min);
        }
        if let Some(max) = c.max_stake {
            stake = stake.min(max);
        }
        stake = stake.min(c.max_stake_multiple * baseline);

        Ok(Sizing {
            stake,
            scale,
            current_vol_pct,
        })
    }

    fn name(&self) -> &str {
        "vol_target"
    }
}
