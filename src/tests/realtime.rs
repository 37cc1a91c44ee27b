use crate::error::Refusal;
use crate::frequency::{OperatingState, PowerBalance};
use crate::grid::{Component, GeneratorType, Grid};
use crate::realtime::{LiveGrid, RealtimeLoop};
use crate::standards::Standards;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn balanced() -> PowerBalance {
    PowerBalance {
        generation: 10_000.0,
        load: 10_000.0,
        capacity: 20_000.0,
        fcr_available: 3000.0,
        frr_available: 10_000.0,
        largest_unit: 1000.0,
    }
}

fn live() -> Arc<Mutex<LiveGrid>> {
    let mut grid = Grid::default();
    let mut gen = Component::generator("g", GeneratorType::Hydro, 400.0);
    gen.voltage_magnitude = 0.98;
    grid.place(gen).unwrap();
    Arc::new(Mutex::new(LiveGrid::new(balanced(), grid, Standards::default())))
}

#[test]
fn live_step_drives_frequency_and_avr() {
    let live = live();
    let mut live = live.lock();
    let report = live.step(1.0).clone();
    assert_eq!(report.time, 1.0);
    assert_eq!(report.deviation, 0.0);
    assert_eq!(report.state, OperatingState::Normal);
    assert_eq!(live.steps, 1);
    assert_eq!(live.last.as_ref(), Some(&report));
    assert!(live.grid.component("g").unwrap().reactive_power > 0.0);
}

#[test]
fn loop_runs_once_at_a_time() {
    let live = live();
    let rt = RealtimeLoop::new(Duration::from_millis(10), 1.0);
    assert!(!rt.is_running());

    let handle = rt.start(live.clone()).unwrap();
    assert!(rt.is_running());
    assert_eq!(rt.start(live.clone()).err(), Some(Refusal::AlreadyRunning));

    thread::sleep(Duration::from_millis(50));
    let steps = handle.stop();
    assert!(steps >= 1);
    assert!(!rt.is_running());
    assert_eq!(live.lock().steps, steps);

    let handle = rt.start(live.clone()).unwrap();
    thread::sleep(Duration::from_millis(30));
    drop(handle);
    assert!(!rt.is_running());
    assert!(live.lock().steps > steps);
}
