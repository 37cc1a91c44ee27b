use crate::frequency::*;
use crate::standards::{FrequencyStandards, Standards};
use crate::state::check_compliance;
use proptest::prelude::*;
use rstest::rstest;

fn fcr(deviation: f64) -> f64 {
    activate_fcr(deviation, &FrequencyStandards::default())
}

proptest! {
    #[test]
    fn fcr_is_odd(x in -1.0..1.0f64) {
        prop_assert_eq!(fcr(-x), -fcr(x));
    }

    #[test]
    fn fcr_is_zero_inside_deadband(x in -0.010..=0.010f64) {
        prop_assert_eq!(fcr(x), 0.0);
    }

    #[test]
    fn fcr_saturates(x in 0.200..5.0f64) {
        prop_assert_eq!(fcr(x), 1.0);
        prop_assert_eq!(fcr(-x), -1.0);
    }

    #[test]
    fn fcr_increases_across_ramp(a in 0.0101..0.199f64, delta in 1e-6..0.1f64) {
        let b = f64::min(a + delta, 0.2);
        prop_assert!(fcr(b) > fcr(a));
        prop_assert!(fcr(a) > 0.0 && fcr(a) < 1.0);
    }
}

#[rstest]
#[case(0.049, true, OperatingState::Normal)]
#[case(0.050, true, OperatingState::Normal)]
#[case(0.0501, true, OperatingState::Alert)]
#[case(0.150, true, OperatingState::Alert)]
#[case(0.200, true, OperatingState::Alert)]
#[case(0.801, true, OperatingState::Emergency)]
#[case(-0.801, true, OperatingState::Emergency)]
#[case(0.0, false, OperatingState::Alert)]
fn classification_boundaries(
    #[case] deviation: f64,
    #[case] n1_secure: bool,
    #[case] expected: OperatingState,
) {
    let state = classify_system_state(deviation, n1_secure, &FrequencyStandards::default());
    assert_eq!(state, expected);
}

#[rstest]
#[case(-0.04, 0.0)]
#[case(-0.1, 1000.0)]
#[case(0.1, -1000.0)]
#[case(-0.5, 4000.0)]
fn frr_is_proportional_and_capped(#[case] deviation: f64, #[case] expected: f64) {
    let mw = activate_frr(deviation, 5000.0, &Standards::default());
    assert!((mw - expected).abs() < 1e-9);
}

fn balanced() -> PowerBalance {
    PowerBalance {
        generation: 50_000.0,
        load: 50_000.0,
        capacity: 60_000.0,
        fcr_available: 3_000.0,
        frr_available: 5_000.0,
        largest_unit: 1_600.0,
    }
}

#[test]
fn balanced_system_stays_normal() {
    let mut ctrl = FrequencyController::new(Standards::default());
    let balance = balanced();
    for _ in 0..60 {
        let report = ctrl.step(1.0, &balance);
        assert_eq!(report.state, OperatingState::Normal);
        assert_eq!(report.deviation, 0.0);
    }
    assert_eq!(ctrl.stats().frequency_violations, 0);
    assert_eq!(ctrl.stats().reliability_score, 100.0);
    assert_eq!(ctrl.time_elapsed(), 60.0);
}

#[test]
fn reserves_contain_a_generator_trip() {
    let mut ctrl = FrequencyController::new(Standards::default());
    let mut balance = balanced();
    ctrl.apply_disturbance(Disturbance::GeneratorTrip { mw: 1000.0 }, &mut balance);
    assert_eq!(ctrl.deviation(), -0.05);
    assert_eq!(balance.generation, 49_000.0);

    let reports: Vec<StepReport> = (0..120).map(|_| ctrl.step(1.0, &balance)).collect();
    assert!(reports.iter().all(|r| r.deviation > -0.2 && r.deviation < 0.0));
    assert!(reports.iter().all(|r| r.state != OperatingState::Emergency));
    assert!(reports.iter().all(|r| r.fcr_mw < 0.0 || r.deviation.abs() <= 0.01));
    assert!(reports.iter().any(|r| r.frr_mw > 0.0));
    assert!(ctrl.stats().fcr_activations > 0);
    assert!(ctrl.stats().frequency_violations > 0);
    assert!(ctrl.stats().reliability_score < 100.0);
}

#[test]
fn losing_the_margin_raises_alert() {
    let mut ctrl = FrequencyController::new(Standards::default());
    let balance = PowerBalance {
        capacity: 51_000.0,
        ..balanced()
    };
    assert_eq!(ctrl.step(1.0, &balance).state, OperatingState::Alert);
    assert_eq!(ctrl.stats().n_minus_1_failures, 1);
}

#[test]
fn frequency_response_recovers_with_fcr() {
    let standards = Standards::default();
    let response = simulate_frequency_response(1000.0, 30.0, 50_000.0, &standards);
    assert_eq!(response.time.len(), 300);
    assert_eq!(response.fcr_available, 1000.0);
    assert_eq!(response.system_inertia, 250_000.0);
    assert!(response.max_deviation > 0.0);
    assert!(response.final_deviation < 0.0);
    assert!(response.fcr_response.iter().all(|&p| p >= 0.0));
    assert!(response.frequency.iter().all(|f| f.is_finite()));
}

#[test]
fn disturbance_drop_follows_the_standards() {
    let mut standards = Standards::default();
    standards.reserves.trip_sensitivity = 10_000.0;
    standards.reserves.load_step_sensitivity = 40_000.0;
    let mut ctrl = FrequencyController::new(standards);
    let mut balance = balanced();

    ctrl.apply_disturbance(Disturbance::GeneratorTrip { mw: 200.0 }, &mut balance);
    assert!((ctrl.deviation() + 0.02).abs() < 1e-12);
    ctrl.apply_disturbance(Disturbance::LoadIncrease { mw: 400.0 }, &mut balance);
    assert!((ctrl.deviation() + 0.03).abs() < 1e-12);
    assert_eq!(balance.load, 50_400.0);
}

fn stuck_low(standards: Standards) -> (FrequencyController, PowerBalance) {
    let mut ctrl = FrequencyController::new(standards);
    ctrl.set_deviation(-0.1);
    let balance = PowerBalance {
        fcr_available: 0.0,
        frr_available: 0.0,
        ..balanced()
    };
    (ctrl, balance)
}

#[test]
fn unrestored_frequency_escalates_to_emergency() {
    let mut standards = Standards::default();
    standards.frequency.time_to_restore = 0.05;
    let (mut ctrl, balance) = stuck_low(standards);

    let states: Vec<OperatingState> = (0..5).map(|_| ctrl.step(1.0, &balance).state).collect();
    assert_eq!(
        states,
        [
            OperatingState::Alert,
            OperatingState::Alert,
            OperatingState::Alert,
            OperatingState::Emergency,
            OperatingState::Emergency,
        ]
    );

    let (mut ctrl, balance) = stuck_low(Standards::default());
    for _ in 0..60 {
        assert_eq!(ctrl.step(1.0, &balance).state, OperatingState::Alert);
    }
}

#[test]
fn reliability_decay_and_n1_margin_come_from_standards() {
    let mut standards = Standards::default();
    standards.frequency.reliability_decay = 1.0;
    standards.network.n1_generation_margin = 0.2;
    let (mut ctrl, balance) = stuck_low(standards);
    // 60 000 - 1 600 < 1.2 * 50 000
    let report = ctrl.step(1.0, &balance);
    assert!(!report.n1_secure);
    ctrl.step(1.0, &balance);
    assert_eq!(ctrl.stats().reliability_score, 98.0);
    assert_eq!(ctrl.stats().n_minus_1_failures, 2);
}

#[test]
fn fcr_ramps_over_its_activation_time() {
    let standards = Standards::default();
    let mut slow = Standards::default();
    slow.frequency.fcr_full_activation_time = 1e6;

    let normal = simulate_frequency_response(1000.0, 30.0, 50_000.0, &standards);
    let lagging = simulate_frequency_response(1000.0, 30.0, 50_000.0, &slow);
    assert!(normal.fcr_response[100] > 0.0);
    assert!(lagging.fcr_response[100] < normal.fcr_response[100]);
    assert!(lagging.final_deviation < normal.final_deviation);

    let none = simulate_frequency_response(1000.0, f64::INFINITY, 50_000.0, &standards);
    assert!(none.time.is_empty());
}

#[test]
fn n1_compliance_can_be_waived() {
    let mut standards = Standards::default();
    assert!(!check_compliance(0.0, &[], 3000.0, false, &standards).n_minus_1_secure);
    standards.network.n1_required = false;
    let report = check_compliance(0.0, &[], 3000.0, false, &standards);
    assert!(report.n_minus_1_secure);
    assert_eq!(report.score(), 100.0);
}
