use crate::contingency::{is_n1_secure, run_contingency_analysis, ContingencyResult};
use crate::dispatch::{economic_dispatch, DispatchResult};
use crate::error::Result;
use crate::frequency::{Disturbance, FrequencyController, PowerBalance, StepReport};
use crate::lu::linear_solver;
use crate::network::Network;
use crate::options::GridOpt;
use crate::pf::{runpf, ConvergenceResult};
use crate::standards::Standards;
use crate::state::{check_compliance, ComplianceReport, SystemState};
use crate::traits::LinearSolver;
use crate::ybus::Ybus;

/// Owns one network together with the options and linear solver used to
/// analyse it. Each session constructs its own engine.
pub struct GridEngine {
    network: Network,
    opt: GridOpt,
    standards: Standards,
    lin_solver: Box<dyn LinearSolver>,
    state: SystemState,
}

impl GridEngine {
    /// The linear solver is chosen once here from `opt.pf.lin_solver`.
    pub fn new(mut network: Network, opt: GridOpt) -> Self {
        network.sparse_threshold = opt.sparse_threshold;
        network.invalidate();
        let standards = network.standards().clone();
        let lin_solver = linear_solver(opt.pf.lin_solver);
        Self {
            network,
            opt,
            standards,
            lin_solver,
            state: SystemState::default(),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Mutable access for structural edits. Edits through the network's own
    /// methods keep the admittance cache consistent.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn options(&self) -> &GridOpt {
        &self.opt
    }

    pub fn standards(&self) -> &Standards {
        &self.standards
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn solve(&mut self) -> Result<ConvergenceResult> {
        let result = runpf(&mut self.network, &self.opt.pf, self.lin_solver.as_ref())?;
        self.update_system_state();
        Ok(result)
    }

    pub fn build_admittance_matrix(&mut self) -> &Ybus {
        self.network.build_admittance_matrix()
    }

    pub fn run_contingency_analysis(&mut self, parallel: bool) -> Result<Vec<ContingencyResult>> {
        let results = run_contingency_analysis(
            &mut self.network,
            parallel,
            self.opt.contingency.max_workers,
            &self.opt.pf,
            self.lin_solver.as_ref(),
            &self.standards.network,
        )?;
        self.state.n_minus_1_secure = is_n1_secure(&results);
        self.update_system_state();
        Ok(results)
    }

    pub fn update_system_state(&mut self) {
        self.state.update(&self.network, &self.standards);
    }

    pub fn set_frequency_deviation(&mut self, deviation: f64) {
        self.state.frequency_deviation = deviation;
        self.update_system_state();
    }

    pub fn economic_dispatch(&self) -> DispatchResult {
        economic_dispatch(&self.network)
    }

    /// Checks the last solution against the operational standards.
    pub fn check_compliance(&self) -> ComplianceReport {
        let voltages: Vec<(f64, f64)> = self
            .network
            .buses()
            .iter()
            .map(|b| (b.vm, b.base_kv))
            .collect();
        check_compliance(
            self.state.frequency_deviation,
            &voltages,
            self.state.fcr_available,
            self.state.n_minus_1_secure,
            &self.standards,
        )
    }

    /// Current generation, load and reserves in the form used by the
    /// frequency model.
    pub fn power_balance(&self) -> PowerBalance {
        let online = || {
            self.network
                .buses()
                .iter()
                .filter(|b| b.gen_online && b.gen_p_max > 0.0)
        };
        let capacity: f64 = online().map(|b| b.gen_p_max).sum();
        let generation = self.state.total_generation;
        PowerBalance {
            generation,
            load: self.state.total_load,
            capacity,
            fcr_available: self.state.fcr_available,
            frr_available: (capacity - generation).max(0.0),
            largest_unit: online().map(|b| b.gen_p_max).fold(0.0, f64::max),
        }
    }

    /// Steps the frequency model for `duration` seconds after a
    /// disturbance and records the resulting activations in the state.
    /// Nothing is simulated unless `dt` is positive and both times are
    /// finite.
    pub fn simulate_frequency_control(
        &mut self,
        disturbance: Disturbance,
        duration: f64,
        dt: f64,
    ) -> Vec<StepReport> {
        if !(dt.is_finite() && dt > 0.0 && duration.is_finite()) {
            log::warn!("invalid frequency simulation: duration {} s, step {} s", duration, dt);
            return Vec::new();
        }
        let mut balance = self.power_balance();
        let mut controller = FrequencyController::new(self.standards.clone());
        controller.set_deviation(self.state.frequency_deviation);
        controller.apply_disturbance(disturbance, &mut balance);

        let steps = (duration / dt).round() as usize;
        let reports: Vec<StepReport> = (0..steps).map(|_| controller.step(dt, &balance)).collect();

        if let Some(last) = reports.last() {
            self.state.fcr_activation = last.fcr_mw;
            self.state.frr_activation = last.frr_mw;
            self.state.frr_available = balance.frr_available;
        }
        self.set_frequency_deviation(controller.deviation());
        reports
    }
}
