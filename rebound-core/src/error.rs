//! Error taxonomy.
//!
//! Two of the four categories are recovered locally and never escalate:
//! - [`InsufficientHistory`]: a window is shorter than an indicator or detector needs.
//!   Consumers treat it as "condition false / signal suppressed".
//! - [`SizingError`]: degenerate volatility; the entry is suppressed for this tick.
//!
//! The other two are fatal and must reach the operator:
//! - [`ConfigError`]: detected at configuration-load time.
//! - [`EngineError::StateInconsistency`]: a bookkeeping bug (exit for an untracked
//!   position, ticks out of timestamp order, unknown instrument).

use thiserror::Error;

use crate::domain::InstrumentId;

/// A window is shorter than the minimum the consumer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient history: need {required} candles, have {available}")]
pub struct InsufficientHistory {
    pub required: usize,
    pub available: usize,
}

/// Configuration rejected at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("serialize config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration {}", summarize(.0))]
    Invalid(Vec<String>),
}

fn summarize(errors: &[String]) -> String {
    format!(
        "({} error{}):\n  - {}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" },
        errors.join("\n  - ")
    )
}

/// Position sizing refused.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SizingError {
    #[error("degenerate volatility: {current_vol_pct}% (ATR={atr}, close={close})")]
    DegenerateVolatility {
        current_vol_pct: f64,
        atr: f64,
        close: f64,
    },

    #[error("baseline stake must be finite and positive, got {0}")]
    InvalidBaseline(f64),
}

/// Fatal engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state inconsistency on {instrument}: {reason}")]
    StateInconsistency {
        instrument: InstrumentId,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn inconsistency(instrument: &InstrumentId, reason: impl Into<String>) -> Self {
        Self::StateInconsistency {
            instrument: instrument.clone(),
            reason: reason.into(),
        }
    }

    /// Every `EngineError` stops the run; recoverable conditions never become one.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::StateInconsistency { .. } | EngineError::Config(_) => true,
        }
    }
}
