//! Per-instrument protections: loss-streak lock and post-trade cooldown.

use chrono::{DateTime, Utc};
use tracing::info;

use super::{Cooldown, CooldownKind, CooldownScope};
use crate::config::ProtectionConfig;
use crate::domain::InstrumentId;
use crate::position_management::ClosedTrade;

#[derive(Debug, Clone)]
pub struct PairProtection {
    instrument: InstrumentId,
    config: ProtectionConfig,
    consecutive_losses: u32,
    cooldowns: Vec<Cooldown>,
}

impl PairProtection {
    pub fn new(instrument: InstrumentId, config: ProtectionConfig) -> Self {
        Self {
            instrument,
            config,
            consecutive_losses: 0,
            cooldowns: Vec::new(),
        }
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Feed a closed trade. Returns the cooldowns it activated.
    ///
    /// Any close starts the post-trade cooldown. A losing close extends the
    /// streak; a non-losing close resets it. Reaching the limit locks the
    /// instrument and restarts the count.
    pub fn record_close(&mut self, trade: &ClosedTrade) -> Vec<Cooldown> {
        let at = trade.exit_time;
        self.cooldowns.retain(|c| c.is_active(at));

        let mut activated = vec![self.cooldown(
            CooldownKind::PostTrade,
            at,
            self.config.post_trade_cooldown(),
        )];

        if trade.is_loss() {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }

        if self.consecutive_losses >= self.config.loss_streak_limit {
            info!(
                instrument = %self.instrument,
                losses = self.consecutive_losses,
                "loss streak limit reached"
            );
            self.consecutive_losses = 0;
            activated.push(self.cooldown(
                CooldownKind::LossStreak,
                at,
                self.config.loss_streak_cooldown(),
            ));
        }

        self.cooldowns.extend(activated.iter().cloned());
        activated
    }

    pub fn active_cooldowns(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Cooldown> {
        self.cooldowns.iter().filter(move |c| c.is_active(now))
    }

    fn cooldown(
        &self,
        kind: CooldownKind,
        at: DateTime<Utc>,
        duration: chrono::Duration,
    ) -> Cooldown {
        Cooldown {
            kind,
            scope: CooldownScope::Instrument(self.instrument.clone()),
            started_at: at,
            until: at + duration,
        }
    }
}
