use crate::frequency::{classify_system_state, OperatingState};
use crate::network::Network;
use crate::standards::Standards;
use chrono::{DateTime, Utc};

/// Snapshot of the operating condition, recomputed after every solve or
/// control step.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    pub timestamp: DateTime<Utc>,
    pub frequency: f64,
    pub frequency_deviation: f64,
    pub state: OperatingState,

    pub total_load: f64,
    pub total_generation: f64,
    pub total_losses: f64,

    pub fcr_available: f64,
    pub frr_available: f64,
    pub fcr_activation: f64,
    pub frr_activation: f64,

    pub voltage_violations: usize,
    pub thermal_violations: usize,
    pub n_minus_1_secure: bool,
    /// 0 to 100.
    pub compliance_score: f64,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            frequency: 50.0,
            frequency_deviation: 0.0,
            state: OperatingState::Normal,
            total_load: 0.0,
            total_generation: 0.0,
            total_losses: 0.0,
            fcr_available: 0.0,
            frr_available: 0.0,
            fcr_activation: 0.0,
            frr_activation: 0.0,
            voltage_violations: 0,
            thermal_violations: 0,
            n_minus_1_secure: true,
            compliance_score: 100.0,
        }
    }
}

impl SystemState {
    /// Recomputes totals, violation counts, compliance score and
    /// classification from the network's last solution.
    pub fn update(&mut self, network: &Network, standards: &Standards) {
        self.timestamp = Utc::now();
        self.frequency = standards.frequency.nominal + self.frequency_deviation;

        self.total_load = network.total_load();
        self.total_generation = network
            .buses()
            .iter()
            .filter(|b| b.gen_online && b.has_generator())
            .map(|b| if b.is_slack() { b.p_inj + b.load_p } else { b.gen_p })
            .sum();
        self.total_losses = network.total_losses();
        self.fcr_available = self.total_generation * standards.reserves.fcr_share;

        self.voltage_violations = network.buses().iter().filter(|b| b.has_violation()).count();
        self.thermal_violations = network
            .branches()
            .iter()
            .filter(|br| br.in_service() && br.loading > 100.0)
            .count();

        let total = (self.voltage_violations + self.thermal_violations) as f64;
        self.compliance_score = (100.0 - total * 5.0).max(0.0);

        self.state = classify_system_state(
            self.frequency_deviation,
            self.n_minus_1_secure,
            &standards.frequency,
        );
    }
}

/// Outcome of the SO GL compliance checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceReport {
    pub frequency_within_standard: bool,
    pub frequency_within_alert: bool,
    pub frequency_safe: bool,
    pub voltages_within_limits: bool,
    pub sufficient_fcr: bool,
    pub n_minus_1_secure: bool,
}

impl ComplianceReport {
    /// Share of checks passed, 0 to 100.
    pub fn score(&self) -> f64 {
        let checks = [
            self.frequency_within_standard,
            self.frequency_within_alert,
            self.frequency_safe,
            self.voltages_within_limits,
            self.sufficient_fcr,
            self.n_minus_1_secure,
        ];
        checks.iter().filter(|&&c| c).count() as f64 / checks.len() as f64 * 100.0
    }
}

/// Checks frequency quality, bus voltages against their bands, FCR
/// sizing against the reference incident and N-1 security. The N-1 check
/// passes unconditionally when the standards do not require it.
pub fn check_compliance(
    frequency_deviation: f64,
    voltages: &[(f64, f64)],
    fcr_available: f64,
    n_minus_1_secure: bool,
    standards: &Standards,
) -> ComplianceReport {
    let f = &standards.frequency;
    let abs_dev = frequency_deviation.abs();
    ComplianceReport {
        frequency_within_standard: abs_dev <= f.standard_range,
        frequency_within_alert: abs_dev <= f.max_steady_state_deviation,
        frequency_safe: abs_dev <= f.max_instantaneous_deviation,
        voltages_within_limits: voltages
            .iter()
            .all(|&(pu, kv)| standards.validate_voltage_level(pu, kv)),
        sufficient_fcr: fcr_available >= standards.reserves.reference_incident,
        n_minus_1_secure: n_minus_1_secure || !standards.network.n1_required,
    }
}
