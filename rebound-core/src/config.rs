//! Strategy configuration: the full parameter surface of the engine.
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration. `validate()` runs on every load path and collects all
//! violations before failing.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::ConfigHash;
use crate::error::ConfigError;

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyConfig {
    pub indicators: IndicatorConfig,
    pub gate: GateConfig,
    pub triggers: TriggerConfig,
    pub entry: EntryConfig,
    pub sizing: SizingConfig,
    pub exits: ExitConfig,
    pub protection: ProtectionConfig,
}

/// Indicator windows, shared by every timeframe the engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorConfig {
    /// Long trend EMA window.
    pub ema_period: usize,
    /// Candles over which the EMA slope is measured.
    pub slope_lookback: usize,
    pub atr_period: usize,
    pub rsi_period: usize,
    /// EMA window of the volatility band middle line.
    pub band_period: usize,
    /// ATR multiple between the band middle and its edges.
    pub band_atr_multiplier: f64,
    pub volume_mean_window: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_period: 200,
            slope_lookback: 1,
            atr_period: 14,
            rsi_period: 14,
            band_period: 20,
            band_atr_multiplier: 1.5,
            volume_mean_window: 20,
        }
    }
}

/// Market gate thresholds (reference timeframe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// EMA slope above which the environment check passes even below the EMA.
    pub ema_slope_threshold: f64,
    /// Minimum flush depth from the recent local high (0.05 = 5%).
    pub deleverage_drop_threshold: f64,
    /// Candles before the flush searched for the local high.
    pub local_high_window: usize,
    /// Minimum share of the flush candle's range recovered by its close.
    pub deleverage_reclaim_ratio: f64,
    /// Candles after the flush allowed for the confirming green close.
    pub deleverage_confirm_candles: usize,
    /// Reference candles searched for a flush.
    pub deleverage_lookback: usize,
    /// Reference candles searched for the panic-release pattern.
    pub panic_lookback: usize,
    /// Oscillator level counted as oversold (shared with the rebound trigger).
    pub panic_oversold: f64,
    /// Oscillator level counted as rebounded (shared with the rebound trigger).
    pub panic_rebound: f64,
    pub panic_green_candles: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            ema_slope_threshold: 0.0,
            deleverage_drop_threshold: 0.05,
            local_high_window: 3,
            deleverage_reclaim_ratio: 0.5,
            deleverage_confirm_candles: 3,
            deleverage_lookback: 12,
            panic_lookback: 12,
            panic_oversold: 25.0,
            panic_rebound: 32.0,
            panic_green_candles: 2,
        }
    }
}

/// Entry trigger parameters (main timeframe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerConfig {
    /// Prior candles defining the swing low.
    pub sweep_lookback: usize,
    /// Close must exceed the swept low by this fraction to count as reclaimed.
    pub sweep_reclaim_buffer: f64,
    /// Candles after the sweep in which the reclaim may happen.
    pub sweep_follow_up_candles: usize,
    pub volume_spike_multiplier: f64,
    /// Candles an oversold reading stays eligible for the rebound trigger.
    pub rebound_lookback: usize,
    pub momentum_candles: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            sweep_lookback: 20,
            sweep_reclaim_buffer: 0.003,
            sweep_follow_up_candles: 2,
            volume_spike_multiplier: 1.5,
            rebound_lookback: 6,
            momentum_candles: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntryConfig {
    pub min_trigger_count: usize,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            min_trigger_count: 2,
        }
    }
}

/// Vol-target sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizingConfig {
    /// When false the proposed stake passes through unscaled.
    pub enabled: bool,
    /// Target ATR-percent volatility per position.
    pub target_vol_pct: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    /// Hard cap as a multiple of the proposed stake.
    pub max_stake_multiple: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_stake: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stake: Option<f64>,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_vol_pct: 1.5,
            scale_min: 0.5,
            scale_max: 1.5,
            max_stake_multiple: 2.0,
            min_stake: None,
            max_stake: None,
        }
    }
}

/// One tier of the minimal-ROI table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoiTier {
    pub after_minutes: u64,
    pub profit: f64,
}

/// Exit state machine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExitConfig {
    pub partial_1_profit: f64,
    /// Share of the remaining size closed at the first target.
    pub partial_1_fraction: f64,
    pub partial_2_profit: f64,
    /// Share of the then-remaining size closed at the second target.
    pub partial_2_fraction: f64,
    /// Initial stop distance in entry-time ATRs.
    pub stop_atr_multiplier: f64,
    pub trailing_activation_profit: f64,
    /// Trailing distance in current ATRs.
    pub trailing_atr_multiplier: f64,
    pub time_stop_minutes: u64,
    /// After the deadline, profit at or below this forces a time stop.
    pub time_stop_profit_threshold: f64,
    pub momentum_exit_enabled: bool,
    /// Oscillator level under which a red candle below the band middle exits.
    pub momentum_loss_rsi: f64,
    /// Minimal-ROI tiers. Empty disables ROI exits.
    pub roi: Vec<RoiTier>,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            partial_1_profit: 0.02,
            partial_1_fraction: 0.4,
            partial_2_profit: 0.04,
            partial_2_fraction: 0.3,
            stop_atr_multiplier: 1.5,
            trailing_activation_profit: 0.02,
            trailing_atr_multiplier: 2.0,
            time_stop_minutes: 45,
            time_stop_profit_threshold: 0.0,
            momentum_exit_enabled: true,
            momentum_loss_rsi: 30.0,
            roi: Vec::new(),
        }
    }
}

impl ExitConfig {
    pub fn time_stop(&self) -> Duration {
        minutes(self.time_stop_minutes)
    }
}

/// Circuit breaker parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtectionConfig {
    /// Consecutive losing closes that lock an instrument.
    pub loss_streak_limit: u32,
    pub loss_streak_cooldown_minutes: u64,
    /// Drawdown magnitude (0.02 = −2%) that locks every instrument.
    pub max_daily_drawdown: f64,
    pub drawdown_lookback_minutes: u64,
    pub drawdown_cooldown_minutes: u64,
    /// Closed trades required in the lookback before drawdown is judged.
    pub drawdown_min_trades: usize,
    pub post_trade_cooldown_minutes: u64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            loss_streak_limit: 2,
            loss_streak_cooldown_minutes: 48 * 60,
            max_daily_drawdown: 0.02,
            drawdown_lookback_minutes: 24 * 60,
            drawdown_cooldown_minutes: 24 * 60,
            drawdown_min_trades: 5,
            post_trade_cooldown_minutes: 30,
        }
    }
}

impl ProtectionConfig {
    pub fn loss_streak_cooldown(&self) -> Duration {
        minutes(self.loss_streak_cooldown_minutes)
    }

    pub fn drawdown_lookback(&self) -> Duration {
        minutes(self.drawdown_lookback_minutes)
    }

    pub fn drawdown_cooldown(&self) -> Duration {
        minutes(self.drawdown_cooldown_minutes)
    }

    pub fn post_trade_cooldown(&self) -> Duration {
        minutes(self.post_trade_cooldown_minutes)
    }
}

fn minutes(m: u64) -> Duration {
    Duration::minutes(i64::try_from(m).unwrap_or(i64::MAX / 60_000))
}

impl StrategyConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Deterministic hash of every parameter value.
    ///
    /// Stamped on diagnostic records so external tuning runs can attribute
    /// outcomes to an exact parameter set.
    pub fn fingerprint(&self) -> Result<ConfigHash, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(ConfigHash::from_bytes(&json))
    }

    /// Check every range constraint. Collects all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        validate_indicators(&self.indicators, &mut errors);
        validate_gate(&self.gate, &mut errors);
        validate_triggers(&self.triggers, &mut errors);
        validate_entry(&self.entry, &mut errors);
        validate_sizing(&self.sizing, &mut errors);
        validate_exits(&self.exits, &mut errors);
        validate_protection(&self.protection, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

fn require(errors: &mut Vec<String>, ok: bool, msg: impl FnOnce() -> String) {
    if !ok {
        errors.push(msg());
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn validate_indicators(c: &IndicatorConfig, errors: &mut Vec<String>) {
    for (name, v) in [
        ("ema_period", c.ema_period),
        ("slope_lookback", c.slope_lookback),
        ("atr_period", c.atr_period),
        ("rsi_period", c.rsi_period),
        ("band_period", c.band_period),
        ("volume_mean_window", c.volume_mean_window),
    ] {
        require(errors, v >= 1, || format!("indicators.{name} must be >= 1"));
    }
    require(errors, positive(c.band_atr_multiplier), || {
        format!(
            "indicators.band_atr_multiplier must be > 0, got {}",
            c.band_atr_multiplier
        )
    });
}

fn validate_gate(c: &GateConfig, errors: &mut Vec<String>) {
    require(errors, c.ema_slope_threshold.is_finite(), || {
        "gate.ema_slope_threshold must be finite".into()
    });
    require(
        errors,
        positive(c.deleverage_drop_threshold) && c.deleverage_drop_threshold < 1.0,
        || {
            format!(
                "gate.deleverage_drop_threshold must be in (0, 1), got {}",
                c.deleverage_drop_threshold
            )
        },
    );
    require(
        errors,
        positive(c.deleverage_reclaim_ratio) && c.deleverage_reclaim_ratio <= 1.0,
        || {
            format!(
                "gate.deleverage_reclaim_ratio must be in (0, 1], got {}",
                c.deleverage_reclaim_ratio
            )
        },
    );
    require(errors, c.local_high_window >= 1, || {
        "gate.local_high_window must be >= 1".into()
    });
    require(errors, c.deleverage_lookback >= 1, || {
        "gate.deleverage_lookback must be >= 1".into()
    });
    require(errors, c.panic_lookback >= 1, || {
        "gate.panic_lookback must be >= 1".into()
    });
    require(errors, c.panic_green_candles >= 1, || {
        "gate.panic_green_candles must be >= 1".into()
    });
    let in_scale = |v: f64| (0.0..=100.0).contains(&v);
    require(errors, in_scale(c.panic_oversold), || {
        format!("gate.panic_oversold must be in [0, 100], got {}", c.panic_oversold)
    });
    require(errors, in_scale(c.panic_rebound), || {
        format!("gate.panic_rebound must be in [0, 100], got {}", c.panic_rebound)
    });
    require(errors, c.panic_oversold < c.panic_rebound, || {
        format!(
            "gate.panic_oversold ({}) must be < panic_rebound ({})",
            c.panic_oversold, c.panic_rebound
        )
    });
}

fn validate_triggers(c: &TriggerConfig, errors: &mut Vec<String>) {
    require(errors, c.sweep_lookback >= 1, || {
        "triggers.sweep_lookback must be >= 1".into()
    });
    require(errors, non_negative(c.sweep_reclaim_buffer), || {
        format!(
            "triggers.sweep_reclaim_buffer must be >= 0, got {}",
            c.sweep_reclaim_buffer
        )
    });
    require(errors, positive(c.volume_spike_multiplier), || {
        format!(
            "triggers.volume_spike_multiplier must be > 0, got {}",
            c.volume_spike_multiplier
        )
    });
    require(errors, c.rebound_lookback >= 1, || {
        "triggers.rebound_lookback must be >= 1".into()
    });
    require(errors, c.momentum_candles >= 1, || {
        "triggers.momentum_candles must be >= 1".into()
    });
}

fn validate_entry(c: &EntryConfig, errors: &mut Vec<String>) {
    require(errors, (1..=4).contains(&c.min_trigger_count), || {
        format!(
            "entry.min_trigger_count must be in 1..=4, got {}",
            c.min_trigger_count
        )
    });
}

fn validate_sizing(c: &SizingConfig, errors: &mut Vec<String>) {
    require(errors, positive(c.target_vol_pct), || {
        format!("sizing.target_vol_pct must be > 0, got {}", c.target_vol_pct)
    });
    require(errors, positive(c.scale_min), || {
        format!("sizing.scale_min must be > 0, got {}", c.scale_min)
    });
    require(errors, c.scale_min <= c.scale_max, || {
        format!(
            "sizing.scale_min ({}) must be <= scale_max ({})",
            c.scale_min, c.scale_max
        )
    });
    require(errors, positive(c.max_stake_multiple), || {
        format!(
            "sizing.max_stake_multiple must be > 0, got {}",
            c.max_stake_multiple
        )
    });
    require(errors, c.scale_min <= c.max_stake_multiple, || {
        format!(
            "sizing.scale_min ({}) must be <= max_stake_multiple ({})",
            c.scale_min, c.max_stake_multiple
        )
    });
    if let Some(min) = c.min_stake {
        require(errors, non_negative(min), || {
            format!("sizing.min_stake must be >= 0, got {min}")
        });
    }
    if let Some(max) = c.max_stake {
        require(errors, positive(max), || {
            format!("sizing.max_stake must be > 0, got {max}")
        });
    }
    if let (Some(min), Some(max)) = (c.min_stake, c.max_stake) {
        require(errors, min <= max, || {
            format!("sizing.min_stake ({min}) must be <= max_stake ({max})")
        });
    }
}

fn validate_exits(c: &ExitConfig, errors: &mut Vec<String>) {
    require(errors, positive(c.partial_1_profit), || {
        format!("exits.partial_1_profit must be > 0, got {}", c.partial_1_profit)
    });
    require(errors, c.partial_1_profit < c.partial_2_profit, || {
        format!(
            "exits.partial_1_profit ({}) must be < partial_2_profit ({})",
            c.partial_1_profit, c.partial_2_profit
        )
    });
    for (name, f) in [
        ("partial_1_fraction", c.partial_1_fraction),
        ("partial_2_fraction", c.partial_2_fraction),
    ] {
        require(errors, positive(f) && f <= 1.0, || {
            format!("exits.{name} must be in (0, 1], got {f}")
        });
    }
    require(
        errors,
        c.partial_1_fraction + c.partial_2_fraction <= 1.0,
        || {
            format!(
                "exits.partial_1_fraction + partial_2_fraction must be <= 1.0, got {}",
                c.partial_1_fraction + c.partial_2_fraction
            )
        },
    );
    require(errors, positive(c.stop_atr_multiplier), || {
        format!(
            "exits.stop_atr_multiplier must be > 0, got {}",
            c.stop_atr_multiplier
        )
    });
    require(errors, positive(c.trailing_atr_multiplier), || {
        format!(
            "exits.trailing_atr_multiplier must be > 0, got {}",
            c.trailing_atr_multiplier
        )
    });
    require(errors, non_negative(c.trailing_activation_profit), || {
        format!(
            "exits.trailing_activation_profit must be >= 0, got {}",
            c.trailing_activation_profit
        )
    });
    require(errors, c.time_stop_minutes >= 1, || {
        "exits.time_stop_minutes must be >= 1".into()
    });
    require(errors, c.time_stop_profit_threshold.is_finite(), || {
        "exits.time_stop_profit_threshold must be finite".into()
    });
    require(errors, (0.0..=100.0).contains(&c.momentum_loss_rsi), || {
        format!(
            "exits.momentum_loss_rsi must be in [0, 100], got {}",
            c.momentum_loss_rsi
        )
    });
    for (i, tier) in c.roi.iter().enumerate() {
        require(errors, positive(tier.profit), || {
            format!("exits.roi[{i}].profit must be > 0, got {}", tier.profit)
        });
    }
    require(
        errors,
        c.roi
            .windows(2)
            .all(|w| w[0].after_minutes < w[1].after_minutes),
        || "exits.roi tiers must be sorted by strictly increasing after_minutes".into(),
    );
}

fn validate_protection(c: &ProtectionConfig, errors: &mut Vec<String>) {
    require(errors, c.loss_streak_limit >= 1, || {
        "protection.loss_streak_limit must be >= 1".into()
    });
    require(
        errors,
        positive(c.max_daily_drawdown) && c.max_daily_drawdown < 1.0,
        || {
            format!(
                "protection.max_daily_drawdown must be in (0, 1), got {}",
                c.max_daily_drawdown
            )
        },
    );
    require(errors, c.drawdown_lookback_minutes >= 1, || {
        "protection.drawdown_lookback_minutes must be >= 1".into()
    });
    require(errors, c.drawdown_min_trades >= 1, || {
        "protection.drawdown_min_trades must be >= 1".into()
    });
}
