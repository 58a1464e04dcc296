//! Keltner channel: EMA ± multiplier × ATR.
//!
//! Each band is its own `Indicator` instance.
//! Lookback: max(ema_period - 1, atr_period).

use super::atr::Atr;
use super::ema::ema_of_series;
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeltnerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Keltner {
    ema_period: usize,
    atr_period: usize,
    multiplier: f64,
    band: KeltnerBand,
    name: String,
}

impl Keltner {
    pub fn new(band: KeltnerBand, ema_period: usize, atr_period: usize, multiplier: f64) -> Self {
        let label = match band {
            KeltnerBand::Upper => "upper",
            KeltnerBand::Middle => "middle",
            KeltnerBand::Lower => "lower",
        };
        Self {
            ema_period,
            atr_period,
            multiplier,
            band,
            name: format!("keltner_{label}_{ema_period}_{atr_period}_{multiplier}"),
        }
    }

    pub fn upper(ema_period: usize, atr_period: usize, multiplier: f64) -> Self {
        Self::new(KeltnerBand::Upper, ema_period, atr_period, multiplier)
    }

    pub fn middle(ema_period: usize, atr_period: usize, multiplier: f64) -> Self {
        Self::new(KeltnerBand::Middle, ema_period, atr_period, multiplier)
    }

    pub fn lower(ema_period: usize, atr_period: usize, multiplier: f64) -> Self {
        Self::new(KeltnerBand::Lower, ema_period, atr_period, multiplier)
    }
}

impl Indicator for Keltner {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.band {
            KeltnerBand::Middle => self.ema_period.saturating_sub(1),
            _ => self.ema_period.saturating_sub(1).max(self.atr_period),
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let middle = ema_of_series(&closes, self.ema_period);

        let sign = match self.band {
            KeltnerBand::Middle => return middle,
            KeltnerBand::Upper => 1.0,
            KeltnerBand::Lower => -1.0,
        };

        let atr = Atr::new(self.atr_period).compute(candles);
        middle
            .iter()
            .zip(&atr)
            .map(|(&m, &a)| m + sign * self.multiplier * a)
            .collect()
    }
}
