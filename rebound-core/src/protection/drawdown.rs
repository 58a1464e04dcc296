//! Global rolling drawdown guard, the only state shared across instruments.
//!
//! Every instrument engine holds a clone of the same guard. Recording a
//! close and reading the resulting drawdown happen under one lock, so
//! concurrent instruments never observe a half-updated ledger.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use super::{Cooldown, CooldownKind, CooldownScope};
use crate::config::ProtectionConfig;

#[derive(Debug)]
struct DrawdownLedger {
    config: ProtectionConfig,
    /// (exit time, profit ratio), sorted by exit time.
    closes: VecDeque<(DateTime<Utc>, f64)>,
    cooldown: Option<Cooldown>,
}

impl DrawdownLedger {
    fn prune(&mut self, now: DateTime<Utc>) {
        let horizon = now - self.config.drawdown_lookback();
        while self.closes.front().is_some_and(|&(at, _)| at < horizon) {
            self.closes.pop_front();
        }
    }

    /// Peak-to-trough decline of the cumulative profit ratio, starting flat.
    fn drawdown(&self) -> f64 {
        let mut cumulative = 0.0_f64;
        let mut peak = 0.0_f64;
        let mut worst = 0.0_f64;
        for &(_, profit) in &self.closes {
            cumulative += profit;
            peak = peak.max(cumulative);
            worst = worst.max(peak - cumulative);
        }
        worst
    }
}

#[derive(Debug, Clone)]
pub struct GlobalDrawdownGuard {
    inner: Arc<Mutex<DrawdownLedger>>,
}

impl GlobalDrawdownGuard {
    pub fn new(config: ProtectionConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DrawdownLedger {
                config,
                closes: VecDeque::new(),
                cooldown: None,
            })),
        }
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, DrawdownLedger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accumulate one closed trade and trip the global cooldown if the
    /// rolling drawdown reaches the limit. Returns the cooldown it started.
    ///
    /// While a cooldown is active no new one starts. A trip clears the
    /// ledger, so the next trip needs fresh losses.
    pub fn record_close(&self, at: DateTime<Utc>, profit_ratio: f64) -> Option<Cooldown> {
        let mut ledger = self.ledger();

        let pos = ledger.closes.partition_point(|&(t, _)| t <= at);
        ledger.closes.insert(pos, (at, profit_ratio));
        let newest = ledger.closes.back().map_or(at, |&(t, _)| t);
        ledger.prune(newest);

        if ledger.cooldown.as_ref().is_some_and(|c| c.is_active(at)) {
            return None;
        }
        if ledger.closes.len() < ledger.config.drawdown_min_trades {
            return None;
        }

        let drawdown = ledger.drawdown();
        if drawdown < ledger.config.max_daily_drawdown {
            return None;
        }

        let cooldown = Cooldown {
            kind: CooldownKind::DailyDrawdown,
            scope: CooldownScope::Global,
            started_at: at,
            until: at + ledger.config.drawdown_cooldown(),
        };
        info!(drawdown, until = %cooldown.until, "global drawdown limit reached");
        ledger.closes.clear();
        ledger.cooldown = Some(cooldown.clone());
        Some(cooldown)
    }

    pub fn active_cooldown(&self, now: DateTime<Utc>) -> Option<Cooldown> {
        self.ledger()
            .cooldown
            .as_ref()
            .filter(|c| c.is_active(now))
            .cloned()
    }

    /// Current rolling drawdown as seen at `now`.
    pub fn current_drawdown(&self, now: DateTime<Utc>) -> f64 {
        let mut ledger = self.ledger();
        ledger.prune(now);
        ledger.drawdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    /// Judges drawdown from the first close.
    fn guard() -> GlobalDrawdownGuard {
        GlobalDrawdownGuard::new(ProtectionConfig {
            drawdown_min_trades: 1,
            ..ProtectionConfig::default()
        })
    }

    #[test]
    fn default_waits_for_enough_trades() {
        let g = GlobalDrawdownGuard::new(ProtectionConfig::default());
        for h in 0..4 {
            assert!(g.record_close(t0() + Duration::hours(h), -0.01).is_none());
        }
        assert!(g.current_drawdown(t0() + Duration::hours(3)) > 0.02);
        assert!(g.record_close(t0() + Duration::hours(4), -0.01).is_some());
    }

    #[test]
    fn single_large_loss_trips() {
        let g = guard();
        let cd = g.record_close(t0(), -0.025).unwrap();
        assert_eq!(cd.kind, CooldownKind::DailyDrawdown);
        assert_eq!(cd.scope, CooldownScope::Global);
        assert!(g.active_cooldown(t0() + Duration::hours(23)).is_some());
        assert!(g.active_cooldown(t0() + Duration::hours(24)).is_none());
    }

    #[test]
    fn drawdown_is_peak_to_trough() {
        let g = guard();
        assert!(g.record_close(t0(), 0.03).is_none());
        assert!(g.record_close(t0() + Duration::hours(1), -0.015).is_none());
        // Net still positive, but 0.03 → 0.005 is a 2.5% decline from the peak
        assert!(g.record_close(t0() + Duration::hours(2), -0.01).is_some());
    }

    #[test]
    fn old_losses_roll_out_of_window() {
        let g = guard();
        assert!(g.record_close(t0(), -0.015).is_none());
        assert!((g.current_drawdown(t0()) - 0.015).abs() < 1e-12);
        assert!(g
            .record_close(t0() + Duration::hours(25), -0.015)
            .is_none());
    }

    #[test]
    fn no_retrip_while_cooling_down() {
        let g = guard();
        assert!(g.record_close(t0(), -0.03).is_some());
        assert!(g.record_close(t0() + Duration::hours(1), -0.03).is_none());
    }

    #[test]
    fn clones_share_one_ledger() {
        let a = guard();
        let b = a.clone();
        a.record_close(t0(), -0.01);
        assert!(b.record_close(t0() + Duration::hours(1), -0.011).is_some());
        assert!(a.active_cooldown(t0() + Duration::hours(2)).is_some());
    }

    #[test]
    fn out_of_order_records_are_sorted() {
        let g = guard();
        g.record_close(t0() + Duration::hours(2), 0.02);
        // Earlier loss recorded late: sequence is −0.01 then +0.02
        assert!(g.record_close(t0() + Duration::hours(1), -0.01).is_none());
        assert!((g.current_drawdown(t0() + Duration::hours(2)) - 0.01).abs() < 1e-12);
    }
}
