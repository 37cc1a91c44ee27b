use crate::error::Refusal;
use crate::frequency::{FrequencyController, PowerBalance, StepReport};
use crate::grid::Grid;
use crate::standards::Standards;
use crate::voltage::VoltageController;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep, so that a stop request is seen promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// State advanced by the real-time loop.
#[derive(Debug, Clone)]
pub struct LiveGrid {
    pub controller: FrequencyController,
    pub balance: PowerBalance,
    pub voltage: VoltageController,
    /// Components whose AVRs are stepped with the frequency model.
    pub grid: Grid,
    pub steps: u64,
    pub last: Option<StepReport>,
}

impl LiveGrid {
    pub fn new(balance: PowerBalance, grid: Grid, standards: Standards) -> Self {
        Self {
            voltage: VoltageController::new(standards.avr.clone()),
            controller: FrequencyController::new(standards),
            balance,
            grid,
            steps: 0,
            last: None,
        }
    }

    /// Advances frequency and voltage control by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> &StepReport {
        self.voltage
            .apply_voltage_control(self.grid.components.values_mut(), dt);
        let report = self.controller.step(dt, &self.balance);
        self.steps += 1;
        self.last.insert(report)
    }
}

/// Steps a shared [`LiveGrid`] on a background thread once per period.
/// At most one loop runs per instance.
#[derive(Debug, Clone)]
pub struct RealtimeLoop {
    running: Arc<AtomicBool>,
    period: Duration,
    dt: f64,
}

impl Default for RealtimeLoop {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 1.0)
    }
}

impl RealtimeLoop {
    /// `dt` is the simulated time advanced per wall-clock `period`.
    pub fn new(period: Duration, dt: f64) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            period,
            dt,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(&self, live: Arc<Mutex<LiveGrid>>) -> Result<RealtimeHandle, Refusal> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Refusal::AlreadyRunning)?;

        let stop = Arc::new(AtomicBool::new(false));
        let running = RunningFlag(self.running.clone());
        let period = self.period;
        let dt = self.dt;
        let stop_flag = stop.clone();

        let thread = thread::spawn(move || {
            let _running = running;
            let mut steps = 0;
            log::info!("real-time loop started");
            while !stop_flag.load(Ordering::SeqCst) {
                let t0 = Instant::now();
                {
                    let mut live = live.lock();
                    let report = live.step(dt);
                    log::trace!(
                        "t={:.0}s f-dev={:.1} mHz state={}",
                        report.time,
                        report.deviation * 1000.0,
                        report.state
                    );
                }
                steps += 1;

                while !stop_flag.load(Ordering::SeqCst) {
                    let elapsed = t0.elapsed();
                    if elapsed >= period {
                        break;
                    }
                    thread::sleep(SLEEP_SLICE.min(period - elapsed));
                }
            }
            log::info!("real-time loop stopped after {} steps", steps);
            steps
        });

        Ok(RealtimeHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Clears the running flag when the loop thread exits, even by panic.
struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct RealtimeHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl RealtimeHandle {
    /// Stops the loop, waits for it and returns the number of steps taken.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.stop.store(true, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                log::error!("real-time loop panicked");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
