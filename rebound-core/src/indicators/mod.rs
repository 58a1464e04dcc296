//! Indicator engine.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! Every series has the same length as its input, with `f64::NAN` during
//! warmup. A value at index t never depends on candles after t.

use crate::domain::Candle;
use std::collections::HashMap;

pub mod atr;
pub mod ema;
pub mod engine;
pub mod keltner;
pub mod rsi;
pub mod volume;

pub use atr::Atr;
pub use ema::Ema;
pub use engine::{IndicatorEngine, IndicatorFrame, IndicatorSnapshot};
pub use keltner::{Keltner, KeltnerBand};
pub use rsi::Rsi;
pub use volume::VolumeMean;

/// A causal indicator over a candle window.
///
/// # Look-ahead contamination guard
/// No value at index t may depend on candle t+1 or later. Every indicator
/// must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_200", "atr_14").
    fn name(&self) -> &str;

    /// Index of the first non-NaN output on clean input.
    fn lookback(&self) -> usize;

    /// Returns a `Vec<f64>` of the same length as `candles`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Named series container, queried by candle index.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Value of `name` at `index`, `None` when either is unknown.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(index).copied())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Synthetic 15-minute candles from close prices.
///
/// open = prev close (or close for the first candle), high/low pad the body
/// by 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle::new(
                base + Duration::minutes(15 * i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Candles from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Candle::new(
                base + Duration::minutes(15 * i as i64),
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_values_insert_and_get() {
        let mut iv = IndicatorValues::new();
        iv.insert(
            "ema_20",
            vec![f64::NAN; 19]
                .into_iter()
                .chain(vec![100.0, 101.0])
                .collect(),
        );
        assert!(iv.get("ema_20", 0).unwrap().is_nan());
        assert_eq!(iv.get("ema_20", 19), Some(100.0));
        assert_eq!(iv.get("ema_20", 21), None);
        assert_eq!(iv.get("missing", 0), None);
    }

    #[test]
    fn indicator_values_len() {
        let mut iv = IndicatorValues::new();
        assert!(iv.is_empty());
        iv.insert("rsi", vec![1.0, 2.0]);
        iv.insert("atr", vec![1.0, 2.0]);
        assert_eq!(iv.len(), 2);
        assert_eq!(iv.names().count(), 2);
    }

    #[test]
    fn make_candles_are_ordered_and_sane() {
        let candles = make_candles(&[10.0, 11.0, 9.0]);
        assert!(candles.iter().all(|c| c.is_sane()));
        assert!(crate::domain::first_out_of_order(&candles).is_none());
    }
}
