//! Indicator engine: one pass over a candle window produces every feature
//! the gate, triggers, sizer and exit machine read.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{Atr, Ema, Indicator, IndicatorValues, Keltner, Rsi, VolumeMean};
use crate::config::IndicatorConfig;
use crate::domain::Candle;
use crate::error::InsufficientHistory;
use crate::indicators::ema::slope_of_series;

pub const EMA: &str = "ema";
pub const EMA_SLOPE: &str = "ema_slope";
pub const ATR: &str = "atr";
pub const ATR_PCT: &str = "atr_pct";
pub const RSI: &str = "rsi";
pub const BAND_LOWER: &str = "band_lower";
pub const BAND_MIDDLE: &str = "band_middle";
pub const BAND_UPPER: &str = "band_upper";
pub const VOLUME_MEAN: &str = "volume_mean";

/// Computes an [`IndicatorFrame`] from a trailing candle window.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Fewest candles for which every feature is defined at the last index.
    pub fn min_history(&self) -> usize {
        let c = &self.config;
        let lookbacks = [
            c.ema_period.saturating_sub(1) + c.slope_lookback,
            Atr::new(c.atr_period).lookback(),
            Rsi::new(c.rsi_period).lookback(),
            Keltner::lower(c.band_period, c.atr_period, c.band_atr_multiplier).lookback(),
            VolumeMean::new(c.volume_mean_window).lookback(),
        ];
        lookbacks.into_iter().max().unwrap_or(0) + 1
    }

    /// Compute every series over `candles`.
    ///
    /// Windows shorter than [`min_history`](Self::min_history) are refused
    /// rather than returned half-warm.
    pub fn compute(&self, candles: &[Candle]) -> Result<IndicatorFrame, InsufficientHistory> {
        let required = self.min_history();
        if candles.len() < required {
            return Err(InsufficientHistory {
                required,
                available: candles.len(),
            });
        }

        let c = &self.config;
        let ema = Ema::new(c.ema_period).compute(candles);
        let slope = slope_of_series(&ema, c.slope_lookback);
        let atr = Atr::new(c.atr_period).compute(candles);
        let atr_pct = atr
            .iter()
            .zip(candles)
            .map(|(&a, candle)| a / candle.close * 100.0)
            .collect();

        let mut values = IndicatorValues::new();
        values.insert(EMA, ema);
        values.insert(EMA_SLOPE, slope);
        values.insert(ATR, atr);
        values.insert(ATR_PCT, atr_pct);
        values.insert(RSI, Rsi::new(c.rsi_period).compute(candles));
        for (name, band) in [
            (BAND_LOWER, Keltner::lower(c.band_period, c.atr_period, c.band_atr_multiplier)),
            (BAND_MIDDLE, Keltner::middle(c.band_period, c.atr_period, c.band_atr_multiplier)),
            (BAND_UPPER, Keltner::upper(c.band_period, c.atr_period, c.band_atr_multiplier)),
        ] {
            values.insert(name, band.compute(candles));
        }
        values.insert(
            VOLUME_MEAN,
            VolumeMean::new(c.volume_mean_window).compute(candles),
        );

        Ok(IndicatorFrame {
            values,
            len: candles.len(),
        })
    }
}

/// Causal feature series for one timeframe window.
///
/// Accessors return NaN for warmup indices, out-of-range indices and unknown
/// names. Any comparison against NaN is false, so a detector reading a
/// missing value reports "not satisfied".
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    values: IndicatorValues,
    len: usize,
}

impl IndicatorFrame {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last_index(&self) -> usize {
        self.len.saturating_sub(1)
    }

    pub fn value(&self, name: &str, i: usize) -> f64 {
        self.values.get(name, i).unwrap_or(f64::NAN)
    }

    /// Full series for `name`; empty when unknown.
    pub fn series(&self, name: &str) -> &[f64] {
        self.values.get_series(name).unwrap_or(&[])
    }

    pub fn ema(&self, i: usize) -> f64 {
        self.value(EMA, i)
    }

    pub fn ema_slope(&self, i: usize) -> f64 {
        self.value(EMA_SLOPE, i)
    }

    pub fn atr(&self, i: usize) -> f64 {
        self.value(ATR, i)
    }

    pub fn atr_pct(&self, i: usize) -> f64 {
        self.value(ATR_PCT, i)
    }

    pub fn rsi(&self, i: usize) -> f64 {
        self.value(RSI, i)
    }

    pub fn band_lower(&self, i: usize) -> f64 {
        self.value(BAND_LOWER, i)
    }

    pub fn band_middle(&self, i: usize) -> f64 {
        self.value(BAND_MIDDLE, i)
    }

    pub fn volume_mean(&self, i: usize) -> f64 {
        self.value(VOLUME_MEAN, i)
    }

    pub fn snapshot(&self, i: usize) -> IndicatorSnapshot {
        let values = self
            .values
            .names()
            .map(|name| (name.to_string(), self.value(name, i)))
            .collect();
        IndicatorSnapshot { index: i, values }
    }

    /// Snapshot at the newest candle.
    pub fn latest(&self) -> IndicatorSnapshot {
        self.snapshot(self.last_index())
    }
}

/// Indicator name → value at one candle index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub index: usize,
    pub values: BTreeMap<String, f64>,
}

impl IndicatorSnapshot {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    fn small_config() -> IndicatorConfig {
        IndicatorConfig {
            ema_period: 10,
            slope_lookback: 1,
            atr_period: 5,
            rsi_period: 5,
            band_period: 6,
            band_atr_multiplier: 1.5,
            volume_mean_window: 4,
        }
    }

    fn closes(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect()
    }

    #[test]
    fn min_history_covers_trend_slope() {
        let engine = IndicatorEngine::new(small_config());
        // ema lookback 9 + slope 1 dominates
        assert_eq!(engine.min_history(), 11);

        let defaults = IndicatorEngine::new(IndicatorConfig::default());
        assert_eq!(defaults.min_history(), 201);
    }

    #[test]
    fn short_window_is_insufficient_history() {
        let engine = IndicatorEngine::new(small_config());
        let err = engine.compute(&make_candles(&closes(10))).unwrap_err();
        assert_eq!(
            err,
            InsufficientHistory {
                required: 11,
                available: 10
            }
        );
    }

    #[test]
    fn minimum_window_has_every_feature_defined() {
        let engine = IndicatorEngine::new(small_config());
        let frame = engine.compute(&make_candles(&closes(11))).unwrap();
        let snap = frame.latest();
        assert_eq!(snap.index, 10);
        for (name, v) in &snap.values {
            assert!(v.is_finite(), "{name} undefined at min window: {v}");
        }
    }

    #[test]
    fn out_of_range_reads_are_nan() {
        let engine = IndicatorEngine::new(small_config());
        let frame = engine.compute(&make_candles(&closes(20))).unwrap();
        assert!(frame.ema(25).is_nan());
        assert!(frame.ema(0).is_nan());
        assert!(frame.value("unknown", 5).is_nan());
    }

    #[test]
    fn recomputation_is_idempotent() {
        let engine = IndicatorEngine::new(small_config());
        let candles = make_candles(&closes(40));
        let a = engine.compute(&candles).unwrap().latest();
        let b = engine.compute(&candles).unwrap().latest();
        assert_eq!(a, b);
    }

    #[test]
    fn atr_pct_relates_atr_to_close() {
        let engine = IndicatorEngine::new(small_config());
        let candles = make_candles(&closes(30));
        let frame = engine.compute(&candles).unwrap();
        let i = frame.last_index();
        let expected = frame.atr(i) / candles[i].close * 100.0;
        assert!((frame.atr_pct(i) - expected).abs() < 1e-12);
    }

    #[test]
    fn bands_bracket_middle() {
        let engine = IndicatorEngine::new(small_config());
        let frame = engine.compute(&make_candles(&closes(30))).unwrap();
        let i = frame.last_index();
        assert!(frame.band_lower(i) < frame.band_middle(i));
        assert!(frame.value(BAND_UPPER, i) > frame.band_middle(i));
    }
}
