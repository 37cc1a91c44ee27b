use crate::grid::{Component, Grid};
use crate::standards::{AvrStandards, Standards};
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoltageViolation {
    /// Measured voltage (p.u.).
    pub voltage: f64,
    pub limits: (f64, f64),
    pub severity: Severity,
}

/// Flags active components whose voltage is outside the band of their
/// voltage level. Severity is high beyond the band widened by the
/// standards' severity margin.
pub fn check_voltage_violations<'a>(
    components: impl IntoIterator<Item = &'a Component>,
    standards: &Standards,
) -> BTreeMap<String, VoltageViolation> {
    let margin = standards.voltage.severity_margin;
    components
        .into_iter()
        .filter(|c| c.is_active)
        .filter_map(|c| {
            let (vmin, vmax) = standards.voltage_limits(c.voltage_kv);
            let v = c.voltage_magnitude;
            if v >= vmin && v <= vmax {
                return None;
            }
            let severity = if v < vmin * (1.0 - margin) || v > vmax * (1.0 + margin) {
                Severity::High
            } else {
                Severity::Medium
            };
            let violation = VoltageViolation {
                voltage: v,
                limits: (vmin, vmax),
                severity,
            };
            Some((c.id.clone(), violation))
        })
        .collect()
}

/// Uncoupled U/Q control: one PI regulator per AVR-enabled generator.
#[derive(Debug, Clone, Default)]
pub struct VoltageController {
    avr: AvrStandards,
}

impl VoltageController {
    pub fn new(avr: AvrStandards) -> Self {
        Self { avr }
    }

    /// PI output for a voltage error, limited to the excitation range.
    pub fn avr_output(&self, error: f64, dt: f64) -> f64 {
        let out = self.avr.kp * error + self.avr.ki * error * dt;
        out.clamp(self.avr.excitation_floor, self.avr.excitation_ceiling)
    }

    /// Runs one AVR step on every active, AVR-enabled generator and sets its
    /// reactive output. Returns the new reactive power per component (MVAr).
    pub fn apply_voltage_control<'a>(
        &self,
        components: impl IntoIterator<Item = &'a mut Component>,
        dt: f64,
    ) -> BTreeMap<String, f64> {
        let mut adjustments = BTreeMap::new();
        for c in components {
            if !(c.is_generator() && c.avr_enabled && c.is_active) {
                continue;
            }
            let error = c.voltage_setpoint - c.voltage_magnitude;
            let out = self.avr_output(error, dt);
            let q = (out * c.capacity * self.avr.reactive_gain).clamp(c.q_min, c.q_max);
            c.reactive_power = q;
            log::trace!("AVR {}: e={:.4} out={:.3} q={:.1}", c.id, error, out, q);
            adjustments.insert(c.id.clone(), q);
        }
        adjustments
    }

    /// Droop-based excitation adjustment towards target voltages, with a
    /// first-order lag over one second.
    pub fn optimize_voltage_control<'a>(
        &self,
        components: impl IntoIterator<Item = &'a Component>,
        targets: &BTreeMap<String, f64>,
    ) -> BTreeMap<String, f64> {
        let lag = 1.0 - (-1.0 / self.avr.time_constant).exp();
        components
            .into_iter()
            .filter_map(|c| {
                let target = targets.get(&c.id)?;
                let error = target - c.voltage_magnitude;
                let response = error / self.avr.voltage_droop * lag;
                let limited =
                    response.clamp(self.avr.excitation_floor, self.avr.excitation_ceiling);
                Some((c.id.clone(), limited))
            })
            .collect()
    }
}

/// Heuristic dV/dQ sensitivity over the grid's components, in id order.
///
/// The diagonal holds 1/Q of each component and off-diagonal entries hold
/// the admittance magnitude 1/|Z| (Ω) of a line joining the two. This is
/// not derived from the power flow Jacobian.
pub fn voltage_sensitivity_matrix(grid: &Grid) -> (Vec<String>, DMatrix<f64>) {
    let ids: Vec<String> = grid.components().map(|c| c.id.clone()).collect();
    let index: BTreeMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let n = ids.len();
    let mut s = DMatrix::<f64>::zeros(n, n);
    for (i, c) in grid.components().enumerate() {
        if c.reactive_power != 0.0 {
            s[(i, i)] = 1.0 / c.reactive_power;
        }
    }
    for line in grid.lines() {
        let z = f64::hypot(line.resistance, line.reactance);
        if z <= 0.0 {
            continue;
        }
        if let (Some(&i), Some(&j)) = (
            index.get(line.from_id.as_str()),
            index.get(line.to_id.as_str()),
        ) {
            s[(i, j)] = 1.0 / z;
            s[(j, i)] = 1.0 / z;
        }
    }
    (ids, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GeneratorType, LoadClass};

    #[test]
    fn severity_follows_margin() {
        let standards = Standards::default();
        let mut low = Component::load("l", LoadClass::Normal, 10.0);
        low.voltage_magnitude = 0.88;
        let mut very_low = Component::load("m", LoadClass::Normal, 10.0);
        very_low.voltage_magnitude = 0.80;
        let ok = Component::load("n", LoadClass::Normal, 10.0);

        let v = check_voltage_violations([&low, &very_low, &ok], &standards);
        assert_eq!(v.len(), 2);
        assert_eq!(v["l"].severity, Severity::Medium);
        assert_eq!(v["m"].severity, Severity::High);
    }

    #[test]
    fn avr_clamps_to_excitation_and_q_limits() {
        let ctrl = VoltageController::default();
        assert_eq!(ctrl.avr_output(1.0, 1.0), 2.0);
        assert_eq!(ctrl.avr_output(-1.0, 1.0), -1.0);

        let mut g = Component::generator("g", GeneratorType::Gas, 100.0);
        g.voltage_magnitude = 0.90;
        let q = ctrl.apply_voltage_control([&mut g], 1.0);
        // 0.1 pu error saturates the exciter at 2.0, 2.0*100*0.25 = 50 MVAr.
        assert_eq!(q["g"], 50.0);
        assert!(g.reactive_power <= g.q_max);
    }

    #[test]
    fn loads_are_not_regulated() {
        let ctrl = VoltageController::default();
        let mut l = Component::load("l", LoadClass::Critical, 50.0);
        assert!(ctrl.apply_voltage_control([&mut l], 1.0).is_empty());
    }
}
