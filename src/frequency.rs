use crate::standards::{FrequencyStandards, ReserveStandards, Standards};
use std::fmt;

/// Operating state of the synchronous area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingState {
    Normal,
    Alert,
    Emergency,
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingState::Normal => write!(f, "normal"),
            OperatingState::Alert => write!(f, "alert"),
            OperatingState::Emergency => write!(f, "emergency"),
        }
    }
}

/// FCR activation as a fraction of available FCR, in [-1, 1].
///
/// Zero inside the deadband, then a linear ramp that saturates at the
/// full-activation deviation. The sign follows the deviation.
pub fn activate_fcr(deviation: f64, standards: &FrequencyStandards) -> f64 {
    let abs_dev = deviation.abs();
    if abs_dev <= standards.fcr_deadband {
        return 0.0;
    }
    let ratio = if abs_dev >= standards.fcr_full_activation_deviation {
        1.0
    } else {
        (abs_dev - standards.fcr_deadband)
            / (standards.fcr_full_activation_deviation - standards.fcr_deadband)
    };
    ratio.copysign(deviation)
}

/// FRR to activate (MW) for a deviation, given the FRR available.
///
/// Nothing is activated inside the standard band. Beyond it the request is
/// proportional to the deviation and capped at a share of what is
/// available. The result is positive when generation must rise.
pub fn activate_frr(deviation: f64, frr_available: f64, standards: &Standards) -> f64 {
    if deviation.abs() <= standards.frequency.standard_range {
        return 0.0;
    }
    let reserves = &standards.reserves;
    let needed = deviation.abs() * reserves.frr_gain;
    let activated = f64::min(needed, frr_available.max(0.0) * reserves.frr_max_fraction);
    if deviation < 0.0 {
        activated
    } else {
        -activated
    }
}

/// Classifies the system from its frequency deviation. Losing N-1
/// security raises an otherwise normal system to alert.
pub fn classify_system_state(
    deviation: f64,
    n1_secure: bool,
    standards: &FrequencyStandards,
) -> OperatingState {
    let abs_dev = deviation.abs();
    if abs_dev <= standards.standard_range {
        if n1_secure {
            OperatingState::Normal
        } else {
            OperatingState::Alert
        }
    } else if abs_dev <= standards.max_steady_state_deviation {
        OperatingState::Alert
    } else {
        OperatingState::Emergency
    }
}

/// Generation, demand and reserves seen by the frequency model (MW).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerBalance {
    pub generation: f64,
    pub load: f64,
    /// Capacity of the online units.
    pub capacity: f64,
    pub fcr_available: f64,
    pub frr_available: f64,
    /// Capacity of the largest online unit.
    pub largest_unit: f64,
}

impl PowerBalance {
    pub fn imbalance(&self) -> f64 {
        self.generation - self.load
    }

    /// Whether the largest unit can trip while the remaining capacity
    /// still covers demand plus `margin`.
    pub fn n1_secure(&self, margin: f64) -> bool {
        self.capacity - self.largest_unit >= self.load * (1.0 + margin)
    }
}

/// Sudden changes applied to the balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Disturbance {
    GeneratorTrip { mw: f64 },
    LoadIncrease { mw: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyStats {
    pub frequency_violations: u64,
    pub fcr_activations: u64,
    pub frr_activations: u64,
    pub n_minus_1_failures: u64,
    /// Starts at 100 and decays while frequency is outside the standard band.
    pub reliability_score: f64,
}

impl Default for FrequencyStats {
    fn default() -> Self {
        Self {
            frequency_violations: 0,
            fcr_activations: 0,
            frr_activations: 0,
            n_minus_1_failures: 0,
            reliability_score: 100.0,
        }
    }
}

/// Result of one integration step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub time: f64,
    pub deviation: f64,
    pub fcr_mw: f64,
    pub frr_mw: f64,
    pub n1_secure: bool,
    pub state: OperatingState,
}

/// Integrates the frequency deviation of a single-area system with FCR
/// and periodic FRR response.
#[derive(Debug, Clone)]
pub struct FrequencyController {
    standards: Standards,
    deviation: f64,
    time_elapsed: f64,
    /// Seconds spent continuously outside the standard range.
    time_outside: f64,
    state: OperatingState,
    stats: FrequencyStats,
}

impl FrequencyController {
    pub fn new(standards: Standards) -> Self {
        Self {
            standards,
            deviation: 0.0,
            time_elapsed: 0.0,
            time_outside: 0.0,
            state: OperatingState::Normal,
            stats: FrequencyStats::default(),
        }
    }

    pub fn deviation(&self) -> f64 {
        self.deviation
    }

    pub fn frequency(&self) -> f64 {
        self.standards.frequency.nominal + self.deviation
    }

    pub fn time_elapsed(&self) -> f64 {
        self.time_elapsed
    }

    pub fn state(&self) -> OperatingState {
        self.state
    }

    pub fn stats(&self) -> &FrequencyStats {
        &self.stats
    }

    pub fn set_deviation(&mut self, deviation: f64) {
        self.deviation = deviation;
    }

    /// Applies a disturbance to `balance` together with its immediate
    /// frequency drop.
    pub fn apply_disturbance(&mut self, disturbance: Disturbance, balance: &mut PowerBalance) {
        let reserves = &self.standards.reserves;
        match disturbance {
            Disturbance::GeneratorTrip { mw } => {
                let lost = mw.min(balance.generation);
                balance.generation -= lost;
                balance.capacity = (balance.capacity - lost).max(0.0);
                self.deviation -= lost / reserves.trip_sensitivity;
            }
            Disturbance::LoadIncrease { mw } => {
                balance.load += mw;
                self.deviation -= mw / reserves.load_step_sensitivity;
            }
        }
        log::debug!("{:?}: deviation {:.1} mHz", disturbance, self.deviation * 1000.0);
    }

    /// Advances the model by `dt` seconds.
    pub fn step(&mut self, dt: f64, balance: &PowerBalance) -> StepReport {
        let reserves: &ReserveStandards = &self.standards.reserves;
        let inertia = reserves.inertia;
        self.time_elapsed += dt;

        // inertial response to the imbalance
        self.deviation += balance.imbalance() / inertia * dt;

        // FCR
        let activation = activate_fcr(self.deviation, &self.standards.frequency);
        let fcr_mw = activation * balance.fcr_available;
        if activation.abs() > reserves.fcr_significant_activation {
            self.stats.fcr_activations += 1;
        }
        self.deviation -= fcr_mw / inertia * dt;

        // FRR, at its activation cadence
        let mut frr_mw = 0.0;
        if self.time_elapsed % reserves.frr_activation_interval < dt {
            frr_mw = activate_frr(self.deviation, balance.frr_available, &self.standards);
            if frr_mw.abs() > reserves.frr_significant_activation {
                self.stats.frr_activations += 1;
            }
            self.deviation += frr_mw / inertia * dt;
        }

        let n1_secure = balance.n1_secure(self.standards.network.n1_generation_margin);
        if !n1_secure {
            self.stats.n_minus_1_failures += 1;
        }

        let frequency = &self.standards.frequency;
        if self.deviation.abs() > frequency.standard_range {
            self.time_outside += dt;
            self.stats.frequency_violations += 1;
            self.stats.reliability_score =
                (self.stats.reliability_score - frequency.reliability_decay).max(0.0);
        } else {
            self.time_outside = 0.0;
        }

        self.state = classify_system_state(self.deviation, n1_secure, frequency);
        if self.state == OperatingState::Alert && self.time_outside > frequency.time_to_restore * 60.0
        {
            self.state = OperatingState::Emergency;
        }

        StepReport {
            time: self.time_elapsed,
            deviation: self.deviation,
            fcr_mw,
            frr_mw,
            n1_secure,
            state: self.state,
        }
    }
}

/// Frequency transient following a sudden loss of generation.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyResponse {
    pub time: Vec<f64>,
    pub frequency: Vec<f64>,
    pub fcr_response: Vec<f64>,
    pub final_deviation: f64,
    pub max_deviation: f64,
    pub final_state: OperatingState,
    pub fcr_available: f64,
    /// Stored kinetic energy proxy (MW·s).
    pub system_inertia: f64,
}

/// Simulates the response to a `disturbance_mw` deficit applied at
/// t = 1 s, with 100 ms steps. Inertia and FCR are derived from
/// `total_generation`. FCR output follows its activation target with the
/// full activation time as time constant.
pub fn simulate_frequency_response(
    disturbance_mw: f64,
    duration: f64,
    total_generation: f64,
    standards: &Standards,
) -> FrequencyResponse {
    let f0 = standards.frequency.nominal;
    let system_inertia = total_generation * standards.reserves.inertia_constant;
    let fcr_available = total_generation * standards.reserves.fcr_share;

    let dt = 0.1;
    let steps = if duration.is_finite() {
        (duration / dt).round() as usize
    } else {
        0
    };
    let onset = (1.0 / dt).round() as usize;

    let mut time = Vec::with_capacity(steps);
    let mut frequency = Vec::with_capacity(steps);
    let mut fcr_response = Vec::with_capacity(steps);
    let mut deviation = 0.0;
    let mut fcr_delivered = 0.0;
    let ramp = (dt / standards.frequency.fcr_full_activation_time).min(1.0);
    let droop = standards.reserves.governor_droop;

    for step in 0..steps {
        let t = step as f64 * dt;
        let mut fcr_mw = 0.0;

        if step == onset && system_inertia > 0.0 {
            deviation = -disturbance_mw / (system_inertia * 2.0 * f0);
        }
        if step > onset && system_inertia > 0.0 {
            let target = -activate_fcr(deviation, &standards.frequency) * fcr_available;
            fcr_delivered += (target - fcr_delivered) * ramp;
            fcr_mw = fcr_delivered;
            deviation += (fcr_mw - disturbance_mw) / system_inertia * dt;
            // governor droop
            deviation -= deviation * droop * dt;
        }

        time.push(t);
        frequency.push(f0 + deviation);
        fcr_response.push(fcr_mw);
    }

    let max_deviation = frequency
        .iter()
        .fold(0.0, |m: f64, f| m.max((f - f0).abs()));
    let final_state = classify_system_state(deviation, true, &standards.frequency);
    log::info!(
        "frequency response to {:.0} MW: max deviation {:.1} mHz, final state {}",
        disturbance_mw,
        max_deviation * 1000.0,
        final_state
    );

    FrequencyResponse {
        time,
        frequency,
        fcr_response,
        final_deviation: deviation,
        max_deviation,
        final_state,
        fcr_available,
        system_inertia,
    }
}
