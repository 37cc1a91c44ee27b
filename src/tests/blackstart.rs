use crate::blackstart::*;
use crate::grid::{Component, GeneratorType, LoadClass};
use crate::standards::BlackstartStandards;

fn units() -> Vec<Component> {
    vec![
        Component::generator("coal", GeneratorType::Coal, 500.0).blackstart(30.0),
        Component::generator("hydro", GeneratorType::Hydro, 200.0).blackstart(5.0),
        Component::generator("gas", GeneratorType::Gas, 300.0).blackstart(10.0),
    ]
}

fn ids(steps: &[RestorationStep], phase: RestorationPhase) -> Vec<&str> {
    steps
        .iter()
        .filter(|s| s.phase == phase)
        .map(|s| s.component_id.as_str())
        .collect()
}

#[test]
fn blackstart_units_start_in_time_order() {
    let standards = BlackstartStandards::default();
    let mut components = units();
    let forward = generate_restoration_sequence(&components, &standards);
    components.reverse();
    let reversed = generate_restoration_sequence(&components, &standards);

    for steps in [&forward, &reversed] {
        assert_eq!(
            ids(steps, RestorationPhase::BlackstartUnits),
            ["hydro", "gas", "coal"]
        );
        let times: Vec<f64> = steps.iter().map(|s| s.time_offset).collect();
        assert_eq!(times, [5.0, 10.0, 30.0]);
        assert!(steps
            .iter()
            .all(|s| s.action == RestorationAction::StartBlackstartUnit));
    }
}

#[test]
fn remaining_generators_follow_type_priority() {
    let components = vec![
        Component::generator("wind", GeneratorType::Wind, 100.0),
        Component::generator("nuclear", GeneratorType::Nuclear, 1200.0),
        Component::generator("hydro", GeneratorType::Hydro, 200.0).blackstart(5.0),
        Component::generator("coal", GeneratorType::Coal, 600.0),
    ];
    let steps = generate_restoration_sequence(&components, &BlackstartStandards::default());

    assert_eq!(
        ids(&steps, RestorationPhase::GenerationRestoration),
        ["coal", "nuclear", "wind"]
    );
    // clock starts at the last blackstart unit and adds each start time
    let times: Vec<f64> = steps[1..].iter().map(|s| s.time_offset).collect();
    assert_eq!(times, [35.0, 95.0, 185.0]);
    assert!(steps.iter().enumerate().all(|(i, s)| s.index == i));
}

#[test]
fn load_pickup_is_capped() {
    let load = Component::load("city", LoadClass::Normal, 400.0);
    let standards = BlackstartStandards::default();
    let steps = generate_restoration_sequence([&load], &standards);

    assert_eq!(steps.len(), 4);
    assert!(steps.iter().all(|s| s.power_mw <= 100.0));
    assert_eq!(steps.iter().map(|s| s.power_mw).sum::<f64>(), 400.0);
    let times: Vec<f64> = steps.iter().map(|s| s.time_offset).collect();
    assert_eq!(times, [5.0, 10.0, 15.0, 20.0]);
}

#[test]
fn critical_loads_restore_first() {
    let components = vec![
        Component::load("mall", LoadClass::Normal, 40.0),
        Component::load("factory", LoadClass::Important, 40.0),
        Component::load("hospital", LoadClass::Critical, 40.0),
        Component::load("school", LoadClass::Normal, 40.0),
    ];
    let steps = generate_restoration_sequence(&components, &BlackstartStandards::default());
    let mut order = ids(&steps, RestorationPhase::LoadRestoration);
    order.dedup();
    assert_eq!(order, ["hospital", "factory", "mall", "school"]);
}

#[test]
fn assessment_applies_minimum_fraction() {
    let mut components = units();
    components.push(Component::load("city", LoadClass::Normal, 9000.0));
    let standards = BlackstartStandards::default();

    let a = assess_blackstart_capability(&components, &standards);
    assert_eq!(a.units.len(), 3);
    assert_eq!(a.total_capacity, 1000.0);
    assert_eq!(a.area_demand, 9000.0);
    assert!(a.meets_standard);

    components.push(Component::load("metro", LoadClass::Normal, 2000.0));
    let a = assess_blackstart_capability(&components, &standards);
    assert!((a.ratio - 1000.0 / 11000.0).abs() < 1e-12);
    assert!(!a.meets_standard);
}

#[test]
fn sequencer_runs_to_completion() {
    let mut components = units();
    components.push(Component::load("city", LoadClass::Critical, 100.0));

    let mut seq = BlackstartSequencer::default();
    assert_eq!(seq.state(), BlackstartState::Idle);
    assert!(seq.assess(&components).meets_standard);
    assert_eq!(seq.state(), BlackstartState::Assessing);

    let n = seq.generate_sequence(&components).unwrap().len();
    assert_eq!(n, 3 + 4);
    assert_eq!(seq.state(), BlackstartState::Sequencing);

    seq.start_restoration().unwrap();
    assert_eq!(seq.state(), BlackstartState::Restoring);
    assert!(seq.is_active());

    let mut taken = Vec::new();
    while let Some(step) = seq.advance() {
        taken.push(step);
    }
    assert_eq!(taken.len(), n);
    assert_eq!(seq.state(), BlackstartState::Complete);
    assert!(!seq.is_active());
    assert_eq!(seq.cursor(), 0);
    assert_eq!(seq.advance(), None);

    // a second run reuses the stored sequence
    seq.start_restoration().unwrap();
    assert_eq!(seq.advance().unwrap(), taken[0]);
}

#[test]
fn restoring_resumes_where_it_left_off() {
    let components = units();
    let mut seq = BlackstartSequencer::default();
    seq.assess(&components);
    seq.generate_sequence(&components).unwrap();
    seq.start_restoration().unwrap();

    let first = seq.advance().unwrap();
    seq.start_restoration().unwrap();
    let second = seq.advance().unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(second.index, 1);
    assert_eq!(seq.cursor(), 2);
}

#[test]
fn non_positive_pickup_ceiling_restores_in_one_step() {
    let components = vec![
        Component::load("a", LoadClass::Critical, 120.0),
        Component::load("b", LoadClass::Normal, 80.0),
    ];
    for ceiling in [0.0, -0.25, f64::NAN] {
        let standards = BlackstartStandards {
            max_load_pickup: ceiling,
            ..Default::default()
        };
        let steps = generate_restoration_sequence(&components, &standards);
        let pickups: Vec<f64> = steps.iter().map(|s| s.power_mw).collect();
        assert_eq!(pickups, [120.0, 80.0]);
    }
}
