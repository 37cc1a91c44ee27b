use crate::error::{GridError, Result};
use crate::network::{Network, Snapshot};
use crate::options::PFOpt;
use crate::pf::runpf;
use crate::standards::NetworkStandards;
use crate::traits::LinearSolver;
use rayon::prelude::*;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// A single element taken out of service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outage {
    /// Branch id.
    Branch(String),
    /// Id of the bus whose generation is lost.
    Generator(String),
}

impl fmt::Display for Outage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outage::Branch(id) => write!(f, "branch {}", id),
            Outage::Generator(id) => write!(f, "generator at {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyResult {
    pub outage: Outage,
    pub converged: bool,
    /// Largest distance outside a bus voltage band (p.u.).
    pub voltage_violation: f64,
    /// Largest branch loading above 100 % (percentage points).
    pub thermal_violation: f64,
    /// Demand left without a path to a slack bus (MW).
    pub load_shed: f64,
    pub critical: bool,
}

impl ContingencyResult {
    fn failed(outage: &Outage, load_shed: f64) -> Self {
        Self {
            outage: outage.clone(),
            converged: false,
            voltage_violation: 0.0,
            thermal_violation: 0.0,
            load_shed,
            critical: true,
        }
    }
}

/// Non-converged cases are always critical. Violations are critical only
/// when they strictly exceed the thresholds.
pub fn is_critical(
    converged: bool,
    voltage_violation: f64,
    thermal_violation: f64,
    standards: &NetworkStandards,
) -> bool {
    !converged
        || voltage_violation > standards.n1_voltage_critical
        || thermal_violation > standards.n1_thermal_critical
}

pub fn is_n1_secure(results: &[ContingencyResult]) -> bool {
    results.iter().all(|r| !r.critical)
}

/// Branches and generators large enough to be analysed, in network order.
pub fn contingency_candidates(network: &Network, standards: &NetworkStandards) -> Vec<Outage> {
    let branches = network
        .branches()
        .iter()
        .filter(|br| br.online && br.rating >= standards.n1_branch_materiality)
        .map(|br| Outage::Branch(br.id.clone()));
    let generators = network
        .buses()
        .iter()
        .filter(|b| b.gen_online && b.gen_p_max >= standards.n1_generator_materiality)
        .map(|b| Outage::Generator(b.id.clone()));
    branches.chain(generators).collect()
}

/// Restores the network to its pre-outage state when dropped, including
/// while unwinding from a panic.
struct OutageGuard<'a> {
    network: &'a mut Network,
    snapshot: Option<Snapshot>,
}

impl<'a> OutageGuard<'a> {
    fn new(network: &'a mut Network) -> Self {
        let snapshot = Some(network.snapshot());
        Self { network, snapshot }
    }
}

impl Deref for OutageGuard<'_> {
    type Target = Network;

    fn deref(&self) -> &Network {
        self.network
    }
}

impl DerefMut for OutageGuard<'_> {
    fn deref_mut(&mut self) -> &mut Network {
        self.network
    }
}

impl Drop for OutageGuard<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.network.restore(snapshot);
        }
    }
}

/// Applies one outage, re-solves and measures the worst violations. The
/// network is left exactly as it was found.
pub fn analyze_outage(
    network: &mut Network,
    outage: &Outage,
    opt: &PFOpt,
    lin_solver: &dyn LinearSolver,
    standards: &NetworkStandards,
) -> ContingencyResult {
    let mut net = OutageGuard::new(network);

    let applied = match outage {
        Outage::Branch(id) => net.set_branch_online(id, false),
        Outage::Generator(id) => net.disable_generator(id),
    };
    if let Err(err) = applied {
        log::warn!("cannot apply outage of {}: {}", outage, err);
        return ContingencyResult::failed(outage, 0.0);
    }

    let load_shed = net.unserved_load();

    match runpf(&mut net, opt, lin_solver) {
        Ok(pf) if pf.converged => {
            let voltage_violation = net
                .buses()
                .iter()
                .map(|b| b.voltage_violation())
                .fold(0.0, f64::max);
            let thermal_violation = net
                .branches()
                .iter()
                .filter(|br| br.in_service())
                .map(|br| br.loading - 100.0)
                .fold(0.0, f64::max);
            ContingencyResult {
                outage: outage.clone(),
                converged: true,
                voltage_violation,
                thermal_violation,
                load_shed,
                critical: is_critical(true, voltage_violation, thermal_violation, standards),
            }
        }
        Ok(_) => ContingencyResult::failed(outage, load_shed),
        Err(err) => {
            log::debug!("outage of {}: {}", outage, err);
            ContingencyResult::failed(outage, load_shed)
        }
    }
}

/// Runs `analyze_outage`, turning a panic into a critical, non-converged
/// result. The guard has already restored the network by then.
fn isolated(
    network: &mut Network,
    outage: &Outage,
    opt: &PFOpt,
    lin_solver: &dyn LinearSolver,
    standards: &NetworkStandards,
) -> ContingencyResult {
    catch_unwind(AssertUnwindSafe(|| {
        analyze_outage(network, outage, opt, lin_solver, standards)
    }))
    .unwrap_or_else(|_| {
        log::error!("analysis of {} panicked", outage);
        ContingencyResult::failed(outage, 0.0)
    })
}

/// Performs N-1 analysis over every material branch and generator.
///
/// In parallel mode each worker solves a private copy of the network on a
/// pool of at most `max_workers` threads. Results are returned in
/// candidate order either way, and the caller's network is unchanged.
pub fn run_contingency_analysis(
    network: &mut Network,
    parallel: bool,
    max_workers: usize,
    opt: &PFOpt,
    lin_solver: &dyn LinearSolver,
    standards: &NetworkStandards,
) -> Result<Vec<ContingencyResult>> {
    let candidates = contingency_candidates(network, standards);
    let t0 = Instant::now();

    let results: Vec<ContingencyResult> = if parallel && candidates.len() > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers.max(1))
            .build()
            .map_err(|err| GridError::WorkerPool(err.to_string()))?;
        network.build_admittance_matrix();
        let base: &Network = network;
        pool.install(|| {
            candidates
                .par_iter()
                .map_init(
                    || base.clone(),
                    |net, outage| isolated(net, outage, opt, lin_solver, standards),
                )
                .collect()
        })
    } else {
        candidates
            .iter()
            .map(|outage| isolated(network, outage, opt, lin_solver, standards))
            .collect()
    };

    let critical = results.iter().filter(|r| r.critical).count();
    log::info!(
        "N-1 analysis: {} contingencies, {} critical ({:.1} ms)",
        results.len(),
        critical,
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(results)
}
