//! Circuit breaker integration tests.
//!
//! Tests:
//! 1. Concurrent closes from many instruments trip the global guard once
//! 2. A global trip blocks every registered instrument until it expires
//! 3. A loss streak locks only its own instrument, with exact expiry
//! 4. Non-losing closes break a streak

use chrono::{DateTime, Duration, TimeZone, Utc};
use rayon::prelude::*;
use rebound_core::config::ProtectionConfig;
use rebound_core::domain::{Candle, ExitReason, InstrumentId, PositionId};
use rebound_core::position_management::ClosedTrade;
use rebound_core::protection::{
    CooldownKind, CooldownScope, GlobalDrawdownGuard, ProtectionMonitor,
};
use rebound_core::{Engine, StrategyConfig, TickInput};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn trade(instrument: &InstrumentId, at: DateTime<Utc>, profit: f64) -> ClosedTrade {
    ClosedTrade {
        position_id: PositionId(1),
        instrument: instrument.clone(),
        entry_time: at - Duration::minutes(45),
        exit_time: at,
        reason: if profit < 0.0 {
            ExitReason::StopLoss
        } else {
            ExitReason::Roi
        },
        exit_price: 100.0 * (1.0 + profit),
        profit_ratio: profit,
        entry_tag: "confirm_2".into(),
    }
}

fn flat_candles(start: DateTime<Utc>, n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            Candle::new(
                start + Duration::minutes(15 * i as i64),
                100.0,
                100.5,
                99.5,
                100.0,
                1000.0,
            )
        })
        .collect()
}

// ──────────────────────────────────────────────
// Global drawdown
// ──────────────────────────────────────────────

#[test]
fn concurrent_closes_trip_global_guard_once() {
    let guard = GlobalDrawdownGuard::new(ProtectionConfig::default());
    let instruments: Vec<InstrumentId> = (0..64)
        .map(|i| InstrumentId::new(format!("COIN{i}/USDT")))
        .collect();

    let trips: usize = instruments
        .par_iter()
        .map(|_| guard.clone())
        .map(|g| usize::from(g.record_close(t0(), -0.005).is_some()))
        .sum();

    assert_eq!(trips, 1);
    assert!(guard.active_cooldown(t0() + Duration::hours(1)).is_some());
}

#[test]
fn global_trip_blocks_every_instrument_until_expiry() {
    let mut config = StrategyConfig::default();
    config.protection.drawdown_min_trades = 1;
    let mut engine = Engine::new(config).unwrap();
    let btc = InstrumentId::new("BTC/USDT");
    let eth = InstrumentId::new("ETH/USDT");
    engine.register(btc.clone());
    engine.register(eth.clone());

    let cooldown = engine.global_guard().record_close(t0(), -0.025).unwrap();
    assert_eq!(cooldown.until, t0() + Duration::hours(24));

    // One tick an hour after the trip, one exactly at expiry
    let candles = flat_candles(t0() - Duration::hours(10), 45);
    let late = flat_candles(t0() - Duration::hours(10), 137);
    assert_eq!(candles.last().unwrap().timestamp, t0() + Duration::hours(1));
    assert_eq!(late.last().unwrap().timestamp, t0() + Duration::hours(24));

    let batch: Vec<_> = [&btc, &eth]
        .into_iter()
        .map(|id| {
            (
                id.clone(),
                TickInput {
                    main: &candles,
                    reference: &candles,
                    proposed_stake: 100.0,
                },
            )
        })
        .collect();
    for (id, result) in engine.on_ticks(&batch) {
        let out = result.unwrap();
        assert_eq!(out.diagnostics.cooldowns.len(), 1, "{id} not blocked");
        assert_eq!(out.diagnostics.cooldowns[0].kind, CooldownKind::DailyDrawdown);
        assert_eq!(out.diagnostics.cooldowns[0].scope, CooldownScope::Global);
    }

    let out = engine
        .on_tick(
            &eth,
            &TickInput {
                main: &late,
                reference: &late,
                proposed_stake: 100.0,
            },
        )
        .unwrap();
    assert!(out.diagnostics.cooldowns.is_empty());
}

// ──────────────────────────────────────────────
// Per-instrument
// ──────────────────────────────────────────────

#[test]
fn loss_streak_locks_only_its_instrument() {
    let config = ProtectionConfig {
        // Keep the global guard out of the way
        max_daily_drawdown: 0.5,
        ..ProtectionConfig::default()
    };
    let global = GlobalDrawdownGuard::new(config.clone());
    let btc = InstrumentId::new("BTC/USDT");
    let eth = InstrumentId::new("ETH/USDT");
    let mut btc_monitor = ProtectionMonitor::new(btc.clone(), config.clone(), global.clone());
    let eth_monitor = ProtectionMonitor::new(eth, config, global);

    btc_monitor.record_close(&trade(&btc, t0(), -0.01));
    let second = t0() + Duration::hours(2);
    let activated = btc_monitor.record_close(&trade(&btc, second, -0.01));
    let lock = activated
        .iter()
        .find(|c| c.kind == CooldownKind::LossStreak)
        .expect("streak lock");
    assert_eq!(lock.until, second + Duration::hours(48));
    assert_eq!(lock.scope, CooldownScope::Instrument(btc.clone()));

    let later = second + Duration::hours(1);
    assert!(!btc_monitor.entry_permit(later).is_permitted());
    assert!(eth_monitor.entry_permit(later).is_permitted());

    // Active strictly before `until`
    let just_before = lock.until - Duration::seconds(1);
    assert!(!btc_monitor.entry_permit(just_before).is_permitted());
    assert!(btc_monitor.entry_permit(lock.until).is_permitted());
}

#[test]
fn breakeven_close_breaks_streak() {
    let config = ProtectionConfig {
        max_daily_drawdown: 0.5,
        ..ProtectionConfig::default()
    };
    let btc = InstrumentId::new("BTC/USDT");
    let mut monitor = ProtectionMonitor::new(
        btc.clone(),
        config.clone(),
        GlobalDrawdownGuard::new(config),
    );

    monitor.record_close(&trade(&btc, t0(), -0.01));
    assert_eq!(monitor.consecutive_losses(), 1);
    monitor.record_close(&trade(&btc, t0() + Duration::hours(1), 0.0));
    assert_eq!(monitor.consecutive_losses(), 0);
    let activated = monitor.record_close(&trade(&btc, t0() + Duration::hours(2), -0.01));
    assert!(activated.iter().all(|c| c.kind == CooldownKind::PostTrade));
}
