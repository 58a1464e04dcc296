//! Market gate: the reference-timeframe permission state.
//!
//! Two states with asymmetric transitions:
//! - `Closed → Open` needs the trend environment plus a de-leverage flush
//!   followed by a panic release, both inside their lookbacks.
//! - `Open → Closed` fires the moment the environment fails. Flush and
//!   release are not re-checked while open.
//!
//! Insufficient reference history counts as a failed environment.

pub mod detectors;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GateConfig;
use crate::domain::Candle;
use crate::indicators::engine::{BAND_LOWER, RSI};
use crate::indicators::IndicatorFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Closed,
    Open,
}

/// What the gate saw on one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateEvaluation {
    pub state: GateState,
    pub environment: bool,
    /// Timestamp of the flush candle, when the opening check ran and found one.
    pub deleverage_at: Option<DateTime<Utc>>,
    /// Timestamp of the release completion candle, when found.
    pub panic_release_at: Option<DateTime<Utc>>,
    pub insufficient_history: bool,
    pub transitioned: bool,
}

/// Sole owner of [`GateState`] for one instrument.
#[derive(Debug, Clone)]
pub struct MarketGate {
    config: GateConfig,
    state: GateState,
    opened_at: Option<DateTime<Utc>>,
}

impl MarketGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            state: GateState::Closed,
            opened_at: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == GateState::Open
    }

    /// Reference candle timestamp at which the gate last opened.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Evaluate against the reference window. `frame` is `None` when the
    /// indicator engine refused the window.
    pub fn evaluate(
        &mut self,
        candles: &[Candle],
        frame: Option<&IndicatorFrame>,
    ) -> GateEvaluation {
        let Some((frame, t)) = frame
            .filter(|f| !candles.is_empty() && f.len() == candles.len())
            .map(|f| (f, candles.len() - 1))
        else {
            let transitioned = self.try_close(candles.last().map(|c| c.timestamp));
            return GateEvaluation {
                state: self.state,
                environment: false,
                deleverage_at: None,
                panic_release_at: None,
                insufficient_history: true,
                transitioned,
            };
        };

        let environment = detectors::environment(
            candles[t].close,
            frame.ema(t),
            frame.ema_slope(t),
            self.config.ema_slope_threshold,
        );

        let mut eval = GateEvaluation {
            state: self.state,
            environment,
            deleverage_at: None,
            panic_release_at: None,
            insufficient_history: false,
            transitioned: false,
        };

        eval.transitioned = match self.state {
            GateState::Open => {
                if environment {
                    false
                } else {
                    self.try_close(Some(candles[t].timestamp))
                }
            }
            GateState::Closed => {
                if !environment {
                    false
                } else {
                    let flush = detectors::find_deleverage(candles, t, &self.config);
                    let release = flush.and_then(|j| {
                        detectors::find_panic_release(
                            candles,
                            frame.series(BAND_LOWER),
                            frame.series(RSI),
                            j,
                            t,
                            &self.config,
                        )
                    });
                    eval.deleverage_at = flush.map(|j| candles[j].timestamp);
                    eval.panic_release_at = release.map(|q| candles[q].timestamp);
                    debug!(
                        environment,
                        deleverage = flush.is_some(),
                        panic_release = release.is_some(),
                        "gate opening check"
                    );
                    release.is_some() && self.try_open(candles[t].timestamp)
                }
            }
        };
        eval.state = self.state;
        eval
    }

    fn try_open(&mut self, at: DateTime<Utc>) -> bool {
        if self.state == GateState::Open {
            return false;
        }
        self.state = GateState::Open;
        self.opened_at = Some(at);
        info!(%at, "market gate opened");
        true
    }

    fn try_close(&mut self, at: Option<DateTime<Utc>>) -> bool {
        if self.state == GateState::Closed {
            return false;
        }
        self.state = GateState::Closed;
        match at {
            Some(at) => info!(%at, "market gate closed"),
            None => info!("market gate closed (no reference data)"),
        }
        true
    }
}
