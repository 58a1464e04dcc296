//! Decision engine: a registry of per-instrument engines sharing one
//! global drawdown guard.
//!
//! Instruments are independent apart from the guard, so a batch of ticks
//! for different instruments can be evaluated in parallel.

pub mod diagnostics;
pub mod instrument;

pub use diagnostics::{HistoryStatus, TickDiagnostics};
pub use instrument::{InstrumentEngine, TickInput, TickOutcome};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::config::StrategyConfig;
use crate::domain::{ConfigHash, ExecutionRequest, ExitReason, InstrumentId};
use crate::error::{ConfigError, EngineError};
use crate::protection::GlobalDrawdownGuard;

#[derive(Debug)]
pub struct Engine {
    config: StrategyConfig,
    fingerprint: ConfigHash,
    global: GlobalDrawdownGuard,
    instruments: BTreeMap<InstrumentId, InstrumentEngine>,
}

impl Engine {
    /// Build an engine. The configuration is validated once here; every
    /// instrument registered later runs with it unchanged.
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let fingerprint = config.fingerprint()?;
        info!(
            fingerprint = %fingerprint.short(),
            min_trigger_count = config.entry.min_trigger_count,
            sizing = config.sizing.enabled,
            "engine configured"
        );
        Ok(Self {
            global: GlobalDrawdownGuard::new(config.protection.clone()),
            config,
            fingerprint,
            instruments: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &ConfigHash {
        &self.fingerprint
    }

    pub fn global_guard(&self) -> &GlobalDrawdownGuard {
        &self.global
    }

    /// Register an instrument. Registering twice keeps the existing state.
    pub fn register(&mut self, instrument: InstrumentId) -> &mut InstrumentEngine {
        let config = &self.config;
        let global = &self.global;
        let fingerprint = &self.fingerprint;
        self.instruments.entry(instrument).or_insert_with_key(|id| {
            info!(instrument = %id, "instrument registered");
            InstrumentEngine::with_validated(
                id.clone(),
                config.clone(),
                global.clone(),
                fingerprint,
            )
        })
    }

    pub fn instrument(&self, id: &InstrumentId) -> Option<&InstrumentEngine> {
        self.instruments.get(id)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.instruments.keys()
    }

    pub fn on_tick(
        &mut self,
        instrument: &InstrumentId,
        input: &TickInput<'_>,
    ) -> Result<TickOutcome, EngineError> {
        let engine = self
            .instruments
            .get_mut(instrument)
            .ok_or_else(|| EngineError::inconsistency(instrument, "instrument not registered"))?;
        engine.on_tick(input).map_err(log_fatal)
    }

    /// Evaluate one tick for each of several instruments in parallel.
    ///
    /// Results come back in the order of `inputs`. An instrument may appear
    /// at most once per batch; its first input runs and later ones fail.
    pub fn on_ticks(
        &mut self,
        inputs: &[(InstrumentId, TickInput<'_>)],
    ) -> Vec<(InstrumentId, Result<TickOutcome, EngineError>)> {
        let mut slots: BTreeMap<&InstrumentId, usize> = BTreeMap::new();
        let mut results: Vec<Option<Result<TickOutcome, EngineError>>> =
            (0..inputs.len()).map(|_| None).collect();

        for (i, (id, _)) in inputs.iter().enumerate() {
            if !self.instruments.contains_key(id) {
                results[i] = Some(Err(EngineError::inconsistency(id, "instrument not registered")));
                continue;
            }
            match slots.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(i);
                }
                Entry::Occupied(_) => {
                    results[i] = Some(Err(EngineError::inconsistency(
                        id,
                        "instrument appears twice in one batch",
                    )));
                }
            }
        }

        let evaluated: Vec<(usize, Result<TickOutcome, EngineError>)> = self
            .instruments
            .par_iter_mut()
            .filter_map(|(id, engine)| {
                let &i = slots.get(id)?;
                Some((i, engine.on_tick(&inputs[i].1)))
            })
            .collect();

        for (i, result) in evaluated {
            results[i] = Some(result.map_err(log_fatal));
        }

        inputs
            .iter()
            .zip(results)
            .map(|((id, _), result)| {
                let result = result.unwrap_or_else(|| {
                    Err(EngineError::inconsistency(id, "instrument not evaluated"))
                });
                (id.clone(), result)
            })
            .collect()
    }

    /// Close an instrument's open position on an external decision.
    pub fn close_position(
        &mut self,
        instrument: &InstrumentId,
        reason: ExitReason,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<ExecutionRequest, EngineError> {
        let engine = self
            .instruments
            .get_mut(instrument)
            .ok_or_else(|| EngineError::inconsistency(instrument, "instrument not registered"))?;
        engine
            .close_position(reason, price, at)
            .map_err(log_fatal)
    }
}

fn log_fatal(e: EngineError) -> EngineError {
    if e.is_fatal() {
        error!(%e, "engine state inconsistency");
    }
    e
}
