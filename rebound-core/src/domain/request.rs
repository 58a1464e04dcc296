//! Execution contract: requests the engine produces for the broker layer.
//!
//! The engine never submits orders. It emits these requests and the
//! surrounding execution layer decides how to fill them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{InstrumentId, PositionId};

/// Why a position was fully closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Fixed initial stop (entry − m×ATR) was hit.
    StopLoss,
    /// Trailing stop was hit after trailing activation.
    TrailingStop,
    /// Breakeven deadline passed without profit.
    TimeStop,
    /// External exit signal (momentum loss or caller-driven close).
    Signal,
    /// Minimal-ROI tier reached.
    Roi,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TimeStop => "time_stop",
            ExitReason::Signal => "signal",
            ExitReason::Roi => "roi",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionRequest {
    Entry {
        instrument: InstrumentId,
        position_id: PositionId,
        stake: f64,
        tag: String,
        at: DateTime<Utc>,
    },
    PartialExit {
        instrument: InstrumentId,
        position_id: PositionId,
        /// Share of the size remaining *before* this exit.
        fraction: f64,
        /// Size fraction (of the initial stake) left open afterwards.
        remaining_after: f64,
        at: DateTime<Utc>,
    },
    FullExit {
        instrument: InstrumentId,
        position_id: PositionId,
        reason: ExitReason,
        at: DateTime<Utc>,
    },
}

impl ExecutionRequest {
    pub fn instrument(&self) -> &InstrumentId {
        match self {
            ExecutionRequest::Entry { instrument, .. }
            | ExecutionRequest::PartialExit { instrument, .. }
            | ExecutionRequest::FullExit { instrument, .. } => instrument,
        }
    }

    pub fn is_full_exit(&self) -> bool {
        matches!(self, ExecutionRequest::FullExit { .. })
    }
}
