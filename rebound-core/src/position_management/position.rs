//! Open position record, owned by the exit state machine until closed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ratchet::StopRatchet;
use crate::config::ExitConfig;
use crate::domain::{ExitReason, InstrumentId, PositionId};

/// Partial-exit progress. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPhase {
    OpenFull,
    Partial1Done,
    Partial2Done,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub instrument: InstrumentId,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub initial_stake: f64,
    /// Share of the initial size still open. 1.0 at entry, exactly 0.0 once closed.
    pub remaining_fraction: f64,
    stop: StopRatchet,
    pub trailing_active: bool,
    pub breakeven_deadline: DateTime<Utc>,
    /// ATR at the entry candle; fixes the initial stop distance.
    pub entry_atr: f64,
    pub phase: ExitPhase,
    pub entry_tag: String,
    /// Size-weighted profit ratio of every slice closed so far.
    pub realized_profit_ratio: f64,
    /// Timestamp of the last tick this position was evaluated on.
    pub last_tick: DateTime<Utc>,
}

impl Position {
    /// Open at `entry_price` with the initial stop at entry − m×ATR.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: PositionId,
        instrument: InstrumentId,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        stake: f64,
        entry_atr: f64,
        entry_tag: impl Into<String>,
        config: &ExitConfig,
    ) -> Self {
        Self {
            id,
            instrument,
            entry_price,
            entry_time,
            initial_stake: stake,
            remaining_fraction: 1.0,
            stop: StopRatchet::with_initial_level(
                entry_price - config.stop_atr_multiplier * entry_atr,
            ),
            trailing_active: false,
            breakeven_deadline: entry_time + config.time_stop(),
            entry_atr,
            phase: ExitPhase::OpenFull,
            entry_tag: entry_tag.into(),
            realized_profit_ratio: 0.0,
            last_tick: entry_time,
        }
    }

    pub fn stop_level(&self) -> f64 {
        self.stop.level()
    }

    pub(crate) fn raise_stop(&mut self, proposed: f64) -> f64 {
        self.stop.apply(proposed)
    }

    pub fn is_closed(&self) -> bool {
        self.phase == ExitPhase::Closed
    }

    /// Unrealized profit ratio at `price`.
    pub fn profit_at(&self, price: f64) -> f64 {
        price / self.entry_price - 1.0
    }

    /// Close `fraction` of the remaining size at `price`. Returns the size
    /// fraction left open.
    pub(crate) fn take_partial(&mut self, fraction: f64, price: f64) -> f64 {
        let slice = self.remaining_fraction * fraction;
        self.realized_profit_ratio += slice * self.profit_at(price);
        self.remaining_fraction -= slice;
        self.remaining_fraction
    }

    /// Close everything still open at `price`.
    pub(crate) fn close(
        &mut self,
        reason: ExitReason,
        price: f64,
        at: DateTime<Utc>,
    ) -> ClosedTrade {
        self.realized_profit_ratio += self.remaining_fraction * self.profit_at(price);
        self.remaining_fraction = 0.0;
        self.phase = ExitPhase::Closed;
        self.last_tick = at;
        ClosedTrade {
            position_id: self.id,
            instrument: self.instrument.clone(),
            entry_time: self.entry_time,
            exit_time: at,
            reason,
            exit_price: price,
            profit_ratio: self.realized_profit_ratio,
            entry_tag: self.entry_tag.clone(),
        }
    }

    pub fn summary(&self) -> PositionSummary {
        PositionSummary {
            id: self.id,
            entry_price: self.entry_price,
            entry_time: self.entry_time,
            remaining_fraction: self.remaining_fraction,
            stop_level: self.stop_level(),
            trailing_active: self.trailing_active,
            phase: self.phase,
            breakeven_deadline: self.breakeven_deadline,
        }
    }
}

/// Final record of a closed position, fed to the circuit breaker monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedTrade {
    pub position_id: PositionId,
    pub instrument: InstrumentId,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub reason: ExitReason,
    pub exit_price: f64,
    /// Size-weighted profit ratio over all partial and final exits.
    pub profit_ratio: f64,
    pub entry_tag: String,
}

impl ClosedTrade {
    pub fn is_loss(&self) -> bool {
        self.profit_ratio < 0.0
    }
}

/// Read-only view for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub id: PositionId,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub remaining_fraction: f64,
    pub stop_level: f64,
    pub trailing_active: bool,
    pub phase: ExitPhase,
    pub breakeven_deadline: DateTime<Utc>,
}
