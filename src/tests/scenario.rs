use crate::cases;
use crate::contingency::Outage;
use crate::engine::GridEngine;
use crate::frequency::{Disturbance, OperatingState};
use crate::options::GridOpt;

fn engine() -> GridEngine {
    GridEngine::new(cases::two_bus().unwrap(), GridOpt::default())
}

#[test]
fn two_bus_solves_within_limits() {
    let mut engine = engine();
    let pf = engine.solve().unwrap();
    assert!(pf.converged);
    assert!(pf.iterations <= 6);

    let net = engine.network();
    let load = net.bus("load").unwrap();
    assert!((load.vm - 1.0441).abs() < 1e-3, "vm = {}", load.vm);

    let line = net.branch("line").unwrap();
    assert!(line.loading > 80.0 && line.loading < 100.0);
    assert!((net.total_losses() - 2.29).abs() < 0.05);

    let state = engine.state();
    assert_eq!(state.thermal_violations, 0);
    assert_eq!(state.voltage_violations, 0);
    assert_eq!(state.total_load, 500.0);
    assert!((state.total_generation - 502.29).abs() < 0.05);
}

#[test]
fn losing_the_only_line_is_critical() {
    let mut engine = engine();
    engine.solve().unwrap();
    let results = engine.run_contingency_analysis(false).unwrap();

    let line = results
        .iter()
        .find(|r| r.outage == Outage::Branch("line".to_string()))
        .unwrap();
    assert!(line.critical);
    assert!(!line.converged);
    assert_eq!(line.load_shed, 500.0);

    assert!(!engine.state().n_minus_1_secure);
    assert_eq!(engine.state().state, OperatingState::Alert);

    let report = engine.check_compliance();
    assert!(!report.n_minus_1_secure);
    assert!(report.voltages_within_limits);
    assert!(report.frequency_within_standard);
    // 2 % of ~500 MW is far short of the reference incident
    assert!(!report.sufficient_fcr);
}

#[test]
fn dispatch_loads_the_only_unit() {
    let engine = engine();
    let d = engine.economic_dispatch();
    assert_eq!(d.setpoints["slack"], 500.0);
    assert_eq!(d.marginal_price, 30.0);
    assert_eq!(d.total_cost, 15_000.0);
    assert_eq!(d.unserved, 0.0);
}

#[test]
fn load_step_pushes_the_system_to_alert() {
    let mut engine = engine();
    engine.solve().unwrap();
    let reports =
        engine.simulate_frequency_control(Disturbance::LoadIncrease { mw: 100.0 }, 60.0, 1.0);

    assert_eq!(reports.len(), 60);
    assert!(reports.iter().all(|r| r.deviation < 0.0));
    // FRR is requested at the 30 s mark once outside the standard band
    assert!(reports[29].frr_mw > 0.0);

    let last = reports.last().unwrap();
    assert!(last.deviation < -0.05 && last.deviation > -0.2);
    assert_eq!(last.state, OperatingState::Alert);
    assert_eq!(engine.state().frequency_deviation, last.deviation);
    assert_eq!(engine.state().state, OperatingState::Alert);
}

#[test]
fn degenerate_time_step_simulates_nothing() {
    let mut engine = engine();
    engine.solve().unwrap();
    for (duration, dt) in [(60.0, 0.0), (60.0, -1.0), (f64::INFINITY, 1.0), (60.0, f64::NAN)] {
        let reports =
            engine.simulate_frequency_control(Disturbance::GeneratorTrip { mw: 100.0 }, duration, dt);
        assert!(reports.is_empty());
    }
    assert_eq!(engine.state().frequency_deviation, 0.0);
}
