//! Circuit breaker monitor.
//!
//! Per instrument: post-trade cooldown and loss-streak lock.
//! Global: rolling drawdown lock shared by every instrument.
//!
//! Pair and global cooldowns compose: an entry is blocked while any of them
//! is active. Cooldowns expire at their recorded timestamp; there is no
//! manual reset.

pub mod drawdown;
pub mod pair;

pub use drawdown::GlobalDrawdownGuard;
pub use pair::PairProtection;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ProtectionConfig;
use crate::domain::InstrumentId;
use crate::position_management::ClosedTrade;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownKind {
    PostTrade,
    LossStreak,
    DailyDrawdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    Instrument(InstrumentId),
    Global,
}

/// An entry block with a fixed expiry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cooldown {
    pub kind: CooldownKind,
    pub scope: CooldownScope,
    pub started_at: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl Cooldown {
    /// Active strictly before `until`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }
}

/// Answer to "may this instrument open a position now?".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryPermit {
    pub blocking: Vec<Cooldown>,
}

impl EntryPermit {
    pub fn is_permitted(&self) -> bool {
        self.blocking.is_empty()
    }
}

/// Protection state for one instrument plus a handle on the global guard.
#[derive(Debug, Clone)]
pub struct ProtectionMonitor {
    pair: PairProtection,
    global: GlobalDrawdownGuard,
}

impl ProtectionMonitor {
    pub fn new(
        instrument: InstrumentId,
        config: ProtectionConfig,
        global: GlobalDrawdownGuard,
    ) -> Self {
        Self {
            pair: PairProtection::new(instrument, config),
            global,
        }
    }

    pub fn entry_permit(&self, now: DateTime<Utc>) -> EntryPermit {
        let mut blocking: Vec<Cooldown> = self.pair.active_cooldowns(now).cloned().collect();
        blocking.extend(self.global.active_cooldown(now));
        EntryPermit { blocking }
    }

    /// Feed a closed trade to both the pair and the global protections.
    /// Returns every cooldown it started.
    pub fn record_close(&mut self, trade: &ClosedTrade) -> Vec<Cooldown> {
        let mut activated = self.pair.record_close(trade);
        activated.extend(self.global.record_close(trade.exit_time, trade.profit_ratio));
        activated
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.pair.consecutive_losses()
    }

    pub fn global(&self) -> &GlobalDrawdownGuard {
        &self.global
    }
}
