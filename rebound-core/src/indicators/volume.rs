//! Rolling mean of volume. Lookback: window - 1.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct VolumeMean {
    window: usize,
    name: String,
}

impl VolumeMean {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "volume window must be >= 1");
        Self {
            window,
            name: format!("volume_mean_{window}"),
        }
    }
}

impl Indicator for VolumeMean {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut result = vec![f64::NAN; candles.len()];
        if candles.len() < self.window {
            return result;
        }
        for (i, w) in candles.windows(self.window).enumerate() {
            result[i + self.window - 1] =
                w.iter().map(|c| c.volume).sum::<f64>() / self.window as f64;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn rolling_mean_known_values() {
        let mut candles = make_candles(&[10.0, 11.0, 12.0, 13.0]);
        for (c, v) in candles.iter_mut().zip([100.0, 200.0, 300.0, 600.0]) {
            c.volume = v;
        }
        let result = VolumeMean::new(3).compute(&candles);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 200.0, DEFAULT_EPSILON);
        assert_approx(result[3], 1100.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn short_input_is_all_nan() {
        let candles = make_candles(&[10.0, 11.0]);
        assert!(VolumeMean::new(3).compute(&candles).iter().all(|v| v.is_nan()));
    }
}
