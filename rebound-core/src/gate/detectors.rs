//! Gate sub-checks on the reference timeframe.
//!
//! Each detector reads candles and indicator series up to index `t` only.
//! Missing values (warmup NaN, index out of range) never satisfy a condition.

use crate::config::GateConfig;
use crate::domain::Candle;

fn at(series: &[f64], i: usize) -> f64 {
    series.get(i).copied().unwrap_or(f64::NAN)
}

/// Trend environment: close above the long EMA, or the EMA rising faster
/// than `slope_threshold`.
pub fn environment(close: f64, ema: f64, slope: f64, slope_threshold: f64) -> bool {
    close > ema || slope > slope_threshold
}

/// Depth of candle `j`'s low below the highest high of the
/// `local_high_window` candles before it, as a fraction of that high.
pub fn flush_depth(candles: &[Candle], j: usize, local_high_window: usize) -> Option<f64> {
    if j < local_high_window || j >= candles.len() {
        return None;
    }
    let local_high = candles[j - local_high_window..j]
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    if local_high.is_nan() || local_high <= 0.0 {
        return None;
    }
    Some((local_high - candles[j].low) / local_high)
}

/// Share of the candle's range recovered by its close.
pub fn reclaim_ratio(candle: &Candle) -> Option<f64> {
    let range = candle.range();
    if range.is_nan() || range <= 0.0 {
        return None;
    }
    Some((candle.close - candle.low) / range)
}

/// Index of the oldest de-leverage flush within the lookback ending at `t`.
///
/// A flush candle drops more than `deleverage_drop_threshold` below the
/// recent local high, closes back at least `deleverage_reclaim_ratio` of its
/// range, and is followed (or is itself) a green close within
/// `deleverage_confirm_candles` candles, all at or before `t`.
pub fn find_deleverage(candles: &[Candle], t: usize, config: &GateConfig) -> Option<usize> {
    if t >= candles.len() {
        return None;
    }
    let start = (t + 1)
        .saturating_sub(config.deleverage_lookback)
        .max(config.local_high_window);

    (start..=t).find(|&j| {
        let deep = flush_depth(candles, j, config.local_high_window)
            .is_some_and(|d| d > config.deleverage_drop_threshold);
        let reclaimed = reclaim_ratio(&candles[j])
            .is_some_and(|r| r >= config.deleverage_reclaim_ratio);
        let confirm_end = (j + config.deleverage_confirm_candles).min(t);
        deep && reclaimed && candles[j..=confirm_end].iter().any(Candle::is_green)
    })
}

/// Number of consecutive green candles ending at `t` (inclusive).
pub fn green_run(candles: &[Candle], t: usize) -> usize {
    if t >= candles.len() {
        return 0;
    }
    candles[..=t]
        .iter()
        .rev()
        .take_while(|c| c.is_green())
        .count()
}

/// Completion index of a panic release in `[from, t]`.
///
/// Pattern, all inside the window:
/// 1. a candle whose low touches or pierces the lower band,
/// 2. a close back above the lower band at or after the touch,
/// 3. an oscillator reading below `panic_oversold`, later followed by one
///    above `panic_rebound` at the completion candle,
/// 4. at least `panic_green_candles` consecutive green closes ending at the
///    completion candle.
///
/// Returns the latest completion index.
pub fn find_panic_release(
    candles: &[Candle],
    band_lower: &[f64],
    rsi: &[f64],
    from: usize,
    t: usize,
    config: &GateConfig,
) -> Option<usize> {
    if t >= candles.len() {
        return None;
    }
    let start = from.max((t + 1).saturating_sub(config.panic_lookback));
    if start > t {
        return None;
    }

    (start..=t).rev().find(|&q| {
        let rebounded = at(rsi, q) > config.panic_rebound;
        if !rebounded || green_run(candles, q) < config.panic_green_candles {
            return false;
        }
        let oversold_before = (start..q).any(|p| at(rsi, p) < config.panic_oversold);
        if !oversold_before {
            return false;
        }
        (start..=q).any(|i| {
            candles[i].low <= at(band_lower, i)
                && (i..=q).any(|r| candles[r].close > at(band_lower, r))
        })
    })
}
