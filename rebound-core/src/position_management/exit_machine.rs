//! Exit state machine.
//!
//! Evaluated once per tick per open position, strictly in timestamp order.
//! Same-tick precedence:
//! 1. price stop (initial stop, or trailing stop once activated)
//! 2. time stop (deadline passed and profit not above the threshold)
//! 3. momentum-loss exit signal
//! 4. minimal-ROI tier
//! 5. partial exits (first, then second, each exactly once)
//! 6. trailing activation and stop update
//!
//! A stop raised in step 6 is first checked on the next tick.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::position::{ClosedTrade, ExitPhase, Position};
use crate::config::ExitConfig;
use crate::domain::{Candle, ExitReason};
use crate::error::EngineError;

/// Market inputs for one exit evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ExitTick<'a> {
    pub candle: &'a Candle,
    pub atr: f64,
    pub rsi: f64,
    pub band_middle: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitAction {
    Partial {
        /// Share of the size remaining before this exit.
        fraction: f64,
        remaining_after: f64,
        price: f64,
    },
    Full {
        reason: ExitReason,
        price: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExitOutcome {
    pub actions: Vec<ExitAction>,
    pub closed: Option<ClosedTrade>,
}

#[derive(Debug, Clone)]
pub struct ExitMachine {
    config: ExitConfig,
}

impl ExitMachine {
    pub fn new(config: ExitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExitConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        position: &mut Position,
        tick: &ExitTick<'_>,
    ) -> Result<ExitOutcome, EngineError> {
        let candle = tick.candle;
        let at = candle.timestamp;

        if position.is_closed() {
            return Err(EngineError::inconsistency(
                &position.instrument,
                format!("exit evaluation for closed position {}", position.id),
            ));
        }
        if at <= position.last_tick {
            return Err(EngineError::inconsistency(
                &position.instrument,
                format!(
                    "tick {at} not after last evaluated tick {} for position {}",
                    position.last_tick, position.id
                ),
            ));
        }

        let mut outcome = ExitOutcome::default();

        let stop = position.stop_level();
        if candle.low <= stop {
            let reason = if position.trailing_active {
                ExitReason::TrailingStop
            } else {
                ExitReason::StopLoss
            };
            // Gap through the stop fills at the open
            let price = candle.open.min(stop);
            return Ok(full_exit(position, outcome, reason, price, at));
        }

        let price = candle.close;
        let profit = position.profit_at(price);

        if let Some(reason) = self.closing_reason(position, tick, profit, at) {
            return Ok(full_exit(position, outcome, reason, price, at));
        }

        if position.phase == ExitPhase::OpenFull && profit >= self.config.partial_1_profit {
            let remaining_after = position.take_partial(self.config.partial_1_fraction, price);
            position.phase = ExitPhase::Partial1Done;
            info!(position = %position.id, profit, remaining_after, "first partial exit");
            outcome.actions.push(ExitAction::Partial {
                fraction: self.config.partial_1_fraction,
                remaining_after,
                price,
            });
        }
        if position.phase == ExitPhase::Partial1Done && profit >= self.config.partial_2_profit {
            let remaining_after = position.take_partial(self.config.partial_2_fraction, price);
            position.phase = ExitPhase::Partial2Done;
            info!(position = %position.id, profit, remaining_after, "second partial exit");
            outcome.actions.push(ExitAction::Partial {
                fraction: self.config.partial_2_fraction,
                remaining_after,
                price,
            });
        }

        if !position.trailing_active && profit >= self.config.trailing_activation_profit {
            position.trailing_active = true;
            info!(position = %position.id, profit, "trailing stop activated");
        }
        if position.trailing_active {
            let proposed = price - self.config.trailing_atr_multiplier * tick.atr;
            let level = position.raise_stop(proposed);
            debug!(position = %position.id, proposed, level, "trailing stop update");
        }

        position.last_tick = at;
        Ok(outcome)
    }

    /// Time stop, exit signal or ROI, in that order.
    fn closing_reason(
        &self,
        position: &Position,
        tick: &ExitTick<'_>,
        profit: f64,
        at: DateTime<Utc>,
    ) -> Option<ExitReason> {
        let c = &self.config;

        if at >= position.breakeven_deadline && profit <= c.time_stop_profit_threshold {
            return Some(ExitReason::TimeStop);
        }

        if c.momentum_exit_enabled
            && tick.rsi < c.momentum_loss_rsi
            && tick.candle.close < tick.band_middle
            && tick.candle.is_red()
        {
            return Some(ExitReason::Signal);
        }

        let elapsed = (at - position.entry_time).num_minutes().max(0) as u64;
        let roi_target = c
            .roi
            .iter()
            .rev()
            .find(|tier| tier.after_minutes <= elapsed)
            .map(|tier| tier.profit);
        if roi_target.is_some_and(|target| profit >= target) {
            return Some(ExitReason::Roi);
        }

        None
    }
}

fn full_exit(
    position: &mut Position,
    mut outcome: ExitOutcome,
    reason: ExitReason,
    price: f64,
    at: DateTime<Utc>,
) -> ExitOutcome {
    let trade = position.close(reason, price, at);
    info!(
        position = %position.id,
        instrument = %position.instrument,
        %reason,
        price,
        profit_ratio = trade.profit_ratio,
        "position closed"
    );
    outcome.actions.push(ExitAction::Full { reason, price });
    outcome.closed = Some(trade);
    outcome
}
