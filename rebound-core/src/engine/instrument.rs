//! Per-instrument decision engine.
//!
//! One tick, in order:
//! 1. feed checks (non-empty, ordered windows, tick after the previous one)
//! 2. indicator frames for both timeframes
//! 3. market gate (reference) and triggers (main)
//! 4. exit machine for the open position, closes fed to protection
//! 5. composer + protection permit → sizer → entry request
//!
//! Everything except the global drawdown guard is owned here.

use chrono::{DateTime, Utc};
use tracing::{debug, debug_span, info, warn};

use super::diagnostics::{HistoryStatus, TickDiagnostics};
use crate::config::StrategyConfig;
use crate::domain::{
    first_out_of_order, Candle, ConfigHash, ExecutionRequest, ExitReason, InstrumentId,
    PositionId,
};
use crate::error::{ConfigError, EngineError};
use crate::gate::{GateState, MarketGate};
use crate::indicators::IndicatorEngine;
use crate::position_management::{ExitAction, ExitMachine, ExitTick, Position};
use crate::protection::{GlobalDrawdownGuard, ProtectionMonitor};
use crate::signals::{compose, TriggerEvaluator};
use crate::sizers::{sizer_from_config, StakeSizer, VolatilityInput};

/// Candle windows for one tick. The newest main candle defines the tick time.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// Trailing window on the trading timeframe.
    pub main: &'a [Candle],
    /// Trailing window on the higher reference timeframe.
    pub reference: &'a [Candle],
    /// Baseline stake proposed by the execution layer.
    pub proposed_stake: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub requests: Vec<ExecutionRequest>,
    pub diagnostics: TickDiagnostics,
}

pub struct InstrumentEngine {
    instrument: InstrumentId,
    config: StrategyConfig,
    fingerprint: String,
    main_indicators: IndicatorEngine,
    reference_indicators: IndicatorEngine,
    gate: MarketGate,
    triggers: TriggerEvaluator,
    exits: ExitMachine,
    sizer: Box<dyn StakeSizer>,
    protection: ProtectionMonitor,
    position: Option<Position>,
    next_position_id: u64,
    last_tick: Option<DateTime<Utc>>,
}

impl InstrumentEngine {
    /// Build a standalone instrument engine. The configuration is validated
    /// here; an invalid one is refused before any tick runs.
    pub fn new(
        instrument: InstrumentId,
        config: StrategyConfig,
        global: GlobalDrawdownGuard,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let fingerprint = config.fingerprint()?;
        Ok(Self::with_validated(instrument, config, global, &fingerprint))
    }

    /// Build from a configuration the caller has already validated and
    /// fingerprinted.
    pub(crate) fn with_validated(
        instrument: InstrumentId,
        config: StrategyConfig,
        global: GlobalDrawdownGuard,
        fingerprint: &ConfigHash,
    ) -> Self {
        let fingerprint = fingerprint.to_string();
        Self {
            main_indicators: IndicatorEngine::new(config.indicators.clone()),
            reference_indicators: IndicatorEngine::new(config.indicators.clone()),
            gate: MarketGate::new(config.gate.clone()),
            triggers: TriggerEvaluator::new(
                config.triggers.clone(),
                config.gate.panic_oversold,
                config.gate.panic_rebound,
            ),
            exits: ExitMachine::new(config.exits.clone()),
            sizer: sizer_from_config(&config.sizing),
            protection: ProtectionMonitor::new(
                instrument.clone(),
                config.protection.clone(),
                global,
            ),
            instrument,
            config,
            fingerprint,
            position: None,
            next_position_id: 1,
            last_tick: None,
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn gate(&self) -> &MarketGate {
        &self.gate
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn protection(&self) -> &ProtectionMonitor {
        &self.protection
    }

    pub fn min_history(&self) -> usize {
        self.main_indicators.min_history()
    }

    pub fn on_tick(&mut self, input: &TickInput<'_>) -> Result<TickOutcome, EngineError> {
        let at = self.check_feed(input)?;
        let _span = debug_span!("tick", instrument = %self.instrument, %at).entered();

        let main_frame = self.main_indicators.compute(input.main);
        let reference_frame = self.reference_indicators.compute(input.reference);
        let main_history = HistoryStatus::from(&main_frame);
        let reference_history = HistoryStatus::from(&reference_frame);
        if let Err(e) = &main_frame {
            debug!(%e, "main timeframe not warmed up");
        }
        if let Err(e) = &reference_frame {
            debug!(%e, "reference timeframe not warmed up");
        }
        let main_frame = main_frame.ok();
        let reference_frame = reference_frame.ok();

        let gate = self.gate.evaluate(input.reference, reference_frame.as_ref());
        let triggers = self.triggers.evaluate(input.main, main_frame.as_ref());

        let t = input.main.len() - 1;
        let candle = &input.main[t];
        let (atr, rsi, band_middle) = main_frame
            .as_ref()
            .map(|f| (f.atr(t), f.rsi(t), f.band_middle(t)))
            .unwrap_or((f64::NAN, f64::NAN, f64::NAN));

        let mut requests = Vec::new();
        let had_position = self.position.is_some();
        if let Some(position) = self.position.as_mut() {
            let outcome = self.exits.evaluate(
                position,
                &ExitTick {
                    candle,
                    atr,
                    rsi,
                    band_middle,
                },
            )?;
            for action in outcome.actions {
                requests.push(match action {
                    ExitAction::Partial {
                        fraction,
                        remaining_after,
                        ..
                    } => ExecutionRequest::PartialExit {
                        instrument: self.instrument.clone(),
                        position_id: position.id,
                        fraction,
                        remaining_after,
                        at,
                    },
                    ExitAction::Full { reason, .. } => ExecutionRequest::FullExit {
                        instrument: self.instrument.clone(),
                        position_id: position.id,
                        reason,
                        at,
                    },
                });
            }
            if let Some(trade) = outcome.closed {
                self.protection.record_close(&trade);
                self.position = None;
            }
        }

        let permit = self.protection.entry_permit(at);
        let entry = compose(
            gate.state,
            &triggers,
            self.config.entry.min_trigger_count,
            permit.is_permitted(),
        );

        let vol = VolatilityInput {
            atr,
            close: candle.close,
        };
        let vol_ratio = main_frame
            .as_ref()
            .map(|_| vol.current_vol_pct())
            .filter(|v| v.is_finite());
        let sizing = self.sizer.size(input.proposed_stake, vol);

        if entry.fire && !had_position {
            match &sizing {
                Ok(s) => {
                    let id = PositionId(self.next_position_id);
                    self.next_position_id += 1;
                    let position = Position::open(
                        id,
                        self.instrument.clone(),
                        candle.close,
                        at,
                        s.stake,
                        atr,
                        entry.tag.clone(),
                        &self.config.exits,
                    );
                    info!(
                        position = %id,
                        tag = %entry.tag,
                        stake = s.stake,
                        scale = s.scale,
                        price = candle.close,
                        stop = position.stop_level(),
                        "entry"
                    );
                    requests.push(ExecutionRequest::Entry {
                        instrument: self.instrument.clone(),
                        position_id: id,
                        stake: s.stake,
                        tag: entry.tag.clone(),
                        at,
                    });
                    self.position = Some(position);
                }
                Err(e) => warn!(%e, tag = %entry.tag, "entry suppressed by sizer"),
            }
        } else if entry.trigger_count >= self.config.entry.min_trigger_count
            && gate.state == GateState::Open
            && !permit.is_permitted()
        {
            debug!(blocking = permit.blocking.len(), "entry blocked by cooldown");
        }

        self.last_tick = Some(at);

        let diagnostics = TickDiagnostics {
            at,
            instrument: self.instrument.clone(),
            config_fingerprint: self.fingerprint.clone(),
            main_history,
            reference_history,
            gate,
            triggers,
            entry,
            vol_ratio,
            sizing: sizing.as_ref().ok().copied(),
            sizing_error: sizing.as_ref().err().map(|e| e.to_string()),
            cooldowns: permit.blocking,
            position: self.position.as_ref().map(Position::summary),
            main_indicators: main_frame.as_ref().map(|f| f.latest()),
            reference_indicators: reference_frame.as_ref().map(|f| f.latest()),
        };

        Ok(TickOutcome {
            requests,
            diagnostics,
        })
    }

    /// Close the open position on an external decision.
    pub fn close_position(
        &mut self,
        reason: ExitReason,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<ExecutionRequest, EngineError> {
        let Some(position) = self.position.as_mut() else {
            return Err(EngineError::inconsistency(
                &self.instrument,
                "close requested with no tracked position",
            ));
        };
        if at < position.last_tick {
            return Err(EngineError::inconsistency(
                &self.instrument,
                format!(
                    "close at {at} precedes last evaluated tick {}",
                    position.last_tick
                ),
            ));
        }

        let trade = position.close(reason, price, at);
        info!(
            position = %trade.position_id,
            %reason,
            price,
            profit_ratio = trade.profit_ratio,
            "position closed externally"
        );
        self.protection.record_close(&trade);
        self.position = None;

        Ok(ExecutionRequest::FullExit {
            instrument: self.instrument.clone(),
            position_id: trade.position_id,
            reason,
            at,
        })
    }

    fn check_feed(&self, input: &TickInput<'_>) -> Result<DateTime<Utc>, EngineError> {
        let Some(newest) = input.main.last() else {
            return Err(EngineError::inconsistency(
                &self.instrument,
                "empty main candle window",
            ));
        };
        for (name, window) in [("main", input.main), ("reference", input.reference)] {
            if let Some(i) = first_out_of_order(window) {
                return Err(EngineError::inconsistency(
                    &self.instrument,
                    format!("{name} candles out of order at index {i}"),
                ));
            }
        }
        let at = newest.timestamp;
        if let Some(reference) = input.reference.last() {
            if reference.timestamp > at {
                return Err(EngineError::inconsistency(
                    &self.instrument,
                    format!(
                        "reference candle {} is ahead of tick {at}",
                        reference.timestamp
                    ),
                ));
            }
        }
        if let Some(last) = self.last_tick {
            if at <= last {
                return Err(EngineError::inconsistency(
                    &self.instrument,
                    format!("tick {at} not after previous tick {last}"),
                ));
            }
        }
        Ok(at)
    }
}

impl std::fmt::Debug for InstrumentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentEngine")
            .field("instrument", &self.instrument)
            .field("gate", &self.gate.state())
            .field("sizer", &self.sizer.name())
            .field("position", &self.position.as_ref().map(|p| p.id))
            .field("last_tick", &self.last_tick)
            .finish()
    }
}
