//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Ratchet monotonicity: stops may only tighten, never loosen
//! 2. Exit machine: size only shrinks, each partial fires once, close is final
//! 3. Vol-target sizing stays inside its clamp and cap
//! 4. Composer: fire iff gate open, enough triggers, and permitted
//! 5. Oscillator range and drawdown sign

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rebound_core::config::{ExitConfig, ProtectionConfig, SizingConfig};
use rebound_core::domain::{Candle, InstrumentId, PositionId};
use rebound_core::gate::GateState;
use rebound_core::indicators::{Indicator, Rsi};
use rebound_core::position_management::{
    ExitAction, ExitMachine, ExitPhase, ExitTick, Position, StopRatchet,
};
use rebound_core::protection::GlobalDrawdownGuard;
use rebound_core::signals::{compose, TriggerSet};
use rebound_core::sizers::{StakeSizer, VolTargetSizer, VolatilityInput};

// ── Strategies (proptest) ────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

/// Per-candle (drift %, low wick %, high wick %, green?).
fn arb_moves(len: usize) -> impl Strategy<Value = Vec<(f64, f64, f64, bool)>> {
    prop::collection::vec(
        (-3.0..3.0_f64, 0.0..2.0_f64, 0.0..2.0_f64, any::<bool>()),
        1..len,
    )
}

fn candles_from_moves(start: f64, moves: &[(f64, f64, f64, bool)]) -> Vec<Candle> {
    let mut price = start;
    moves
        .iter()
        .enumerate()
        .map(|(i, &(drift, low_wick, high_wick, green))| {
            let next = (price * (1.0 + drift / 100.0)).max(1.0);
            let (open, close) = if green {
                (price.min(next), price.max(next))
            } else {
                (price.max(next), price.min(next))
            };
            let high = open.max(close) * (1.0 + high_wick / 100.0);
            let low = open.min(close) * (1.0 - low_wick / 100.0);
            price = next;
            Candle::new(
                t0() + Duration::minutes(15 * (i as i64 + 1)),
                open,
                high,
                low,
                close,
                1000.0,
            )
        })
        .collect()
}

fn arb_triggers() -> impl Strategy<Value = TriggerSet> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(a, b, c, d)| {
        TriggerSet {
            sweep_reclaim: a,
            volume_spike: b,
            oscillator_rebound: c,
            momentum_run: d,
        }
    })
}

// ── 1. Ratchet Monotonicity ──────────────────────────────────────────

proptest! {
    /// The ratchet level is non-decreasing for any proposal sequence.
    #[test]
    fn ratchet_never_loosens(
        initial in 50.0..150.0_f64,
        proposals in prop::collection::vec(prop_oneof![
            (0.0..300.0_f64).boxed(),
            Just(f64::NAN).boxed(),
        ], 1..50),
    ) {
        let mut ratchet = StopRatchet::with_initial_level(initial);
        let mut prev = ratchet.level();
        for p in proposals {
            let level = ratchet.apply(p);
            prop_assert!(level >= prev, "ratchet loosened: {prev} -> {level}");
            prop_assert_eq!(level, ratchet.level());
            prev = level;
        }
    }
}

// ── 2. Exit Machine ──────────────────────────────────────────────────

proptest! {
    /// Walking any candle path: the stop never drops, the open fraction never
    /// grows, each partial fires at most once, and after the close every
    /// further evaluation is refused.
    #[test]
    fn exit_machine_invariants(
        moves in arb_moves(60),
        atr in 0.5..5.0_f64,
        rsi in 0.0..100.0_f64,
    ) {
        let config = ExitConfig::default();
        let machine = ExitMachine::new(config.clone());
        let mut position = Position::open(
            PositionId(1),
            InstrumentId::new("BTC/USDT"),
            100.0,
            t0(),
            100.0,
            atr,
            "confirm_2",
            &config,
        );
        let candles = candles_from_moves(100.0, &moves);

        let mut stop = position.stop_level();
        let mut remaining = position.remaining_fraction;
        let mut partials = 0;
        let mut closes = 0;

        for candle in &candles {
            let tick = ExitTick { candle, atr, rsi, band_middle: 100.0 };
            let result = machine.evaluate(&mut position, &tick);
            if closes > 0 {
                prop_assert!(result.is_err());
                continue;
            }
            let outcome = result.unwrap();

            for action in &outcome.actions {
                match action {
                    ExitAction::Partial { .. } => partials += 1,
                    ExitAction::Full { .. } => closes += 1,
                }
            }
            prop_assert!(partials <= 2);
            prop_assert_eq!(outcome.closed.is_some(), closes == 1);

            prop_assert!(position.remaining_fraction <= remaining + 1e-12);
            prop_assert!(position.remaining_fraction >= 0.0);
            remaining = position.remaining_fraction;

            if !position.is_closed() {
                prop_assert!(position.stop_level() >= stop);
                stop = position.stop_level();
            } else {
                prop_assert_eq!(position.phase, ExitPhase::Closed);
            }
        }
    }

    /// A gap through the stop fills at the open, never above the stop.
    #[test]
    fn stop_fill_never_above_stop(gap in 0.0..20.0_f64, atr in 0.5..5.0_f64) {
        let config = ExitConfig::default();
        let machine = ExitMachine::new(config.clone());
        let mut position = Position::open(
            PositionId(1),
            InstrumentId::new("BTC/USDT"),
            100.0,
            t0(),
            100.0,
            atr,
            "confirm_2",
            &config,
        );
        let stop = position.stop_level();
        let open = stop + 1.0 - gap;
        let candle = Candle::new(
            t0() + Duration::minutes(15),
            open,
            open + 0.5,
            open.min(stop) - 0.5,
            open,
            1000.0,
        );
        let tick = ExitTick { candle: &candle, atr, rsi: 50.0, band_middle: 100.0 };
        let outcome = machine.evaluate(&mut position, &tick).unwrap();
        let trade = outcome.closed.unwrap();
        prop_assert!(trade.exit_price <= stop + 1e-12);
        prop_assert!((trade.exit_price - open.min(stop)).abs() < 1e-12);
    }
}

// ── 3. Sizing ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn vol_target_stake_within_bounds(
        baseline in 1.0..10_000.0_f64,
        atr in 0.0001..50.0_f64,
        close in 1.0..1000.0_f64,
    ) {
        let config = SizingConfig::default();
        let sizer = VolTargetSizer::new(config.clone());
        let sizing = sizer.size(baseline, VolatilityInput { atr, close }).unwrap();

        prop_assert!(sizing.scale >= config.scale_min && sizing.scale <= config.scale_max);
        prop_assert!(sizing.stake <= config.max_stake_multiple * baseline + 1e-9);
        prop_assert!(sizing.stake >= config.scale_min * baseline - 1e-9);
    }

    #[test]
    fn vol_target_rejects_degenerate_volatility(
        baseline in 1.0..10_000.0_f64,
        close in 1.0..1000.0_f64,
    ) {
        let sizer = VolTargetSizer::new(SizingConfig::default());
        let flat = sizer.size(baseline, VolatilityInput { atr: 0.0, close });
        let undefined = sizer.size(baseline, VolatilityInput { atr: f64::NAN, close });
        prop_assert!(flat.is_err());
        prop_assert!(undefined.is_err());
    }
}

// ── 4. Composer ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn compose_fires_exactly_when_all_conditions_hold(
        triggers in arb_triggers(),
        open in any::<bool>(),
        permitted in any::<bool>(),
        min in 1usize..=4,
    ) {
        let gate = if open { GateState::Open } else { GateState::Closed };
        let signal = compose(gate, &triggers, min, permitted);
        let count = triggers.as_array().iter().filter(|&&b| b).count();

        prop_assert_eq!(signal.trigger_count, count);
        prop_assert_eq!(signal.fire, open && permitted && count >= min);
        prop_assert_eq!(signal.tag, format!("confirm_{count}"));
    }
}

// ── 5. Ranges ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_stays_in_range(moves in arb_moves(80), period in 2usize..20) {
        let candles = candles_from_moves(100.0, &moves);
        for v in Rsi::new(period).compute(&candles) {
            prop_assert!(v.is_nan() || (0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn drawdown_is_never_negative(
        profits in prop::collection::vec(-0.01..0.01_f64, 1..30),
    ) {
        let config = ProtectionConfig {
            max_daily_drawdown: 1.0,
            ..ProtectionConfig::default()
        };
        let guard = GlobalDrawdownGuard::new(config);
        for (i, p) in profits.iter().enumerate() {
            let at = t0() + Duration::minutes(10 * i as i64);
            guard.record_close(at, *p);
            prop_assert!(guard.current_drawdown(at) >= 0.0);
        }
    }
}
