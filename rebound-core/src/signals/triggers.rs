//! The four entry triggers on the main timeframe.
//!
//! Every trigger is scored independently; overlapping triggers (a sweep
//! reclaim that is also a momentum run) each count. Only the oscillator
//! rebound carries state across ticks: the timestamp of the last oversold
//! reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TriggerConfig;
use crate::domain::Candle;
use crate::gate::detectors::green_run;
use crate::indicators::IndicatorFrame;

/// Four independent trigger booleans for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSet {
    pub sweep_reclaim: bool,
    pub volume_spike: bool,
    pub oscillator_rebound: bool,
    pub momentum_run: bool,
}

impl TriggerSet {
    pub fn as_array(&self) -> [bool; 4] {
        [
            self.sweep_reclaim,
            self.volume_spike,
            self.oscillator_rebound,
            self.momentum_run,
        ]
    }

    /// Number of true triggers, always in 0..=4.
    pub fn count(&self) -> usize {
        self.as_array().iter().filter(|&&b| b).count()
    }
}

/// Rolling "last seen oversold" state for the rebound trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OversoldMemory {
    pub last_oversold: Option<DateTime<Utc>>,
    /// Newest candle already folded into `last_oversold`.
    pub last_scanned: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TriggerEvaluator {
    config: TriggerConfig,
    oversold: f64,
    rebound: f64,
    memory: OversoldMemory,
}

impl TriggerEvaluator {
    /// `oversold` and `rebound` are the oscillator thresholds shared with
    /// the gate's panic-release check.
    pub fn new(config: TriggerConfig, oversold: f64, rebound: f64) -> Self {
        Self {
            config,
            oversold,
            rebound,
            memory: OversoldMemory::default(),
        }
    }

    pub fn memory(&self) -> OversoldMemory {
        self.memory
    }

    /// Score all four triggers at the newest candle.
    ///
    /// `frame` is `None` when the window is too short; every trigger is
    /// then false and the memory is left untouched.
    pub fn evaluate(&mut self, candles: &[Candle], frame: Option<&IndicatorFrame>) -> TriggerSet {
        let Some(frame) = frame.filter(|f| !candles.is_empty() && f.len() == candles.len()) else {
            return TriggerSet::default();
        };
        let t = candles.len() - 1;

        self.observe_oversold(candles, frame, t);

        TriggerSet {
            sweep_reclaim: sweep_reclaim(candles, t, &self.config),
            volume_spike: volume_spike(
                candles[t].volume,
                frame.volume_mean(t),
                self.config.volume_spike_multiplier,
            ),
            oscillator_rebound: self.oscillator_rebound(candles, frame, t),
            momentum_run: green_run(candles, t) >= self.config.momentum_candles,
        }
    }

    /// Fold candles newer than the last scan into the oversold memory.
    fn observe_oversold(&mut self, candles: &[Candle], frame: &IndicatorFrame, t: usize) {
        let first = (t + 1).saturating_sub(self.config.rebound_lookback + 1);
        for (i, candle) in candles.iter().enumerate().take(t + 1).skip(first) {
            if self.memory.last_scanned.is_some_and(|s| candle.timestamp <= s) {
                continue;
            }
            if frame.rsi(i) < self.oversold {
                self.memory.last_oversold = Some(candle.timestamp);
            }
        }
        self.memory.last_scanned = Some(candles[t].timestamp);
    }

    fn oscillator_rebound(&self, candles: &[Candle], frame: &IndicatorFrame, t: usize) -> bool {
        let horizon = candles[t.saturating_sub(self.config.rebound_lookback)].timestamp;
        let recent_oversold = self
            .memory
            .last_oversold
            .is_some_and(|ts| ts >= horizon && ts <= candles[t].timestamp);
        recent_oversold && frame.rsi(t) > self.rebound
    }
}

/// A recent candle undercut the prior swing low and a close since then
/// recovered above it by the reclaim buffer.
pub fn sweep_reclaim(candles: &[Candle], t: usize, config: &TriggerConfig) -> bool {
    if t >= candles.len() {
        return false;
    }
    let first = t
        .saturating_sub(config.sweep_follow_up_candles)
        .max(config.sweep_lookback);

    (first..=t).any(|k| {
        let swing_low = candles[k - config.sweep_lookback..k]
            .iter()
            .map(|c| c.low)
            .fold(f64::INFINITY, f64::min);
        let reclaim_level = swing_low * (1.0 + config.sweep_reclaim_buffer);
        candles[k].low < swing_low && candles[k..=t].iter().any(|c| c.close > reclaim_level)
    })
}

/// Volume above `multiplier` times its rolling mean.
pub fn volume_spike(volume: f64, mean: f64, multiplier: f64) -> bool {
    mean > 0.0 && volume > multiplier * mean
}
