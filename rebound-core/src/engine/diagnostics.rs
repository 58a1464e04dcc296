//! Per-tick diagnostic record for external analysis tooling.
//!
//! The engine never reads these back.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::InstrumentId;
use crate::error::InsufficientHistory;
use crate::gate::GateEvaluation;
use crate::indicators::IndicatorSnapshot;
use crate::position_management::PositionSummary;
use crate::protection::Cooldown;
use crate::signals::{EntrySignal, TriggerSet};
use crate::sizers::Sizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HistoryStatus {
    Ready,
    Insufficient { required: usize, available: usize },
}

impl HistoryStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, HistoryStatus::Ready)
    }
}

impl<T> From<&Result<T, InsufficientHistory>> for HistoryStatus {
    fn from(result: &Result<T, InsufficientHistory>) -> Self {
        match result {
            Ok(_) => HistoryStatus::Ready,
            Err(e) => HistoryStatus::Insufficient {
                required: e.required,
                available: e.available,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickDiagnostics {
    pub at: DateTime<Utc>,
    pub instrument: InstrumentId,
    pub config_fingerprint: String,
    pub main_history: HistoryStatus,
    pub reference_history: HistoryStatus,
    pub gate: GateEvaluation,
    pub triggers: TriggerSet,
    pub entry: EntrySignal,
    /// ATR percent of close on the main timeframe.
    pub vol_ratio: Option<f64>,
    /// Sizing preview at this tick's volatility.
    pub sizing: Option<Sizing>,
    pub sizing_error: Option<String>,
    pub cooldowns: Vec<Cooldown>,
    pub position: Option<PositionSummary>,
    pub main_indicators: Option<IndicatorSnapshot>,
    pub reference_indicators: Option<IndicatorSnapshot>,
}
