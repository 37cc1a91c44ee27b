use crate::bus_types::bus_types;
use crate::debug::format_polar_vec;
use crate::error::{GridError, Result};
use crate::fd::{fdpf, make_b};
use crate::gauss::gausspf;
use crate::network::{Network, BusType};
use crate::newton::newtonpf;
use crate::options::{Alg, PFOpt};
use crate::sbus::{make_sbus, power_injection};
use crate::traits::{LinearSolver, LogProgress};
use num_complex::Complex64;
use std::time::Instant;

/// Raw solver output, before it is written back to the network.
pub(crate) struct PfSolution {
    pub v: Vec<Complex64>,
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch: f64,
}

/// Outcome of a power flow solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceResult {
    pub algorithm: Alg,
    pub converged: bool,
    pub iterations: usize,
    /// Infinity norm of the final P & Q mismatch (p.u.).
    pub max_mismatch: f64,
    /// Final voltage magnitudes (p.u.) in bus order.
    pub vm: Vec<f64>,
    /// Final voltage angles (radians) in bus order.
    pub va: Vec<f64>,
    /// Solve time in seconds.
    pub elapsed: f64,
}

/// Initial voltage vector. Slack and PV buses hold their magnitude
/// setpoints; with a flat start, PQ buses start at 1.0 p.u. and all angles
/// at zero.
fn initial_voltage(network: &Network, flat_start: bool) -> Vec<Complex64> {
    network
        .buses()
        .iter()
        .map(|b| {
            if !flat_start {
                b.voltage_phasor()
            } else {
                match b.bus_type {
                    BusType::Slack => Complex64::from_polar(b.vm, b.va),
                    BusType::PV if b.gen_online => Complex64::from_polar(b.vm, 0.0),
                    _ => Complex64::new(1.0, 0.0),
                }
            }
        })
        .collect()
}

/// Runs an AC power flow on `network`.
///
/// Bus voltages, computed injections and branch flows are written back
/// only when the solve converges. Non-convergence is reported through
/// the returned result; structural and numerical failures are errors.
pub fn runpf(
    network: &mut Network,
    opt: &PFOpt,
    lin_solver: &dyn LinearSolver,
) -> Result<ConvergenceResult> {
    if network.is_empty() {
        return Err(GridError::EmptyNetwork);
    }

    // get bus index lists of each type of bus
    let (ref_, pv, pq) = bus_types(network.buses());
    if ref_.is_empty() {
        return Err(GridError::NoSlack);
    }

    let s_bus = make_sbus(network.base_mva, network.buses());
    let v0 = initial_voltage(network, opt.flat_start);
    let names: Vec<String> = network.buses().iter().map(|b| b.id.clone()).collect();
    let b_mats = match opt.algorithm {
        Alg::FD => Some(make_b(network.n_buses(), network.branches(), &pv, &pq)),
        _ => None,
    };

    let progress = LogProgress {};
    let t0 = Instant::now();

    let (sol, s_calc) = {
        let y_bus = network.build_admittance_matrix();
        let sol = match (opt.algorithm, b_mats) {
            (Alg::FD, Some((b_p, b_pp))) => fdpf(
                y_bus,
                &s_bus,
                &v0,
                b_p,
                b_pp,
                &pv,
                &pq,
                lin_solver,
                opt,
                Some(&progress),
            )?,
            (Alg::GS, _) => {
                let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
                gausspf(y_bus, &s_bus, &v0, &pv, &pq, &names, opt, Some(&progress))?
            }
            _ => newtonpf(
                y_bus,
                &s_bus,
                &v0,
                &pv,
                &pq,
                lin_solver,
                opt,
                Some(&progress),
            )?,
        };
        let s_calc = power_injection(y_bus, &sol.v);
        (sol, s_calc)
    };
    let elapsed = t0.elapsed().as_secs_f64();

    if sol.converged {
        log::info!(
            "{} power flow converged in {} iterations ({:.3} ms)",
            opt.algorithm,
            sol.iterations,
            elapsed * 1000.0
        );
        log::debug!("V = {}", format_polar_vec(&sol.v));
        pfsoln(network, &sol.v, &s_calc);
    } else {
        log::warn!(
            "{} power flow did not converge in {} iterations (mismatch {:e})",
            opt.algorithm,
            sol.iterations,
            sol.max_mismatch
        );
    }

    Ok(ConvergenceResult {
        algorithm: opt.algorithm,
        converged: sol.converged,
        iterations: sol.iterations,
        max_mismatch: sol.max_mismatch,
        vm: sol.v.iter().map(|v| v.norm()).collect(),
        va: sol.v.iter().map(|v| v.arg()).collect(),
        elapsed,
    })
}

/// Updates bus voltages, computed injections and branch flows after a
/// converged solve.
fn pfsoln(network: &mut Network, v: &[Complex64], s_calc: &[Complex64]) {
    let base_mva = network.base_mva;

    for (b, (v, s)) in network.buses_mut().iter_mut().zip(v.iter().zip(s_calc)) {
        b.vm = v.norm();
        b.va = v.arg();
        b.p_inj = s.re * base_mva;
        b.q_inj = s.im * base_mva;
    }

    for br in network.branches_mut() {
        if !br.in_service() {
            br.clear_flows();
            continue;
        }
        let y_b = 1.0 / br.impedance();
        let (v_f, v_t) = (v[br.from], v[br.to]);

        let s_f = v_f * ((v_f - v_t) * y_b).conj();
        let s_t = v_t * ((v_t - v_f) * y_b).conj();

        br.p_from = s_f.re * base_mva;
        br.q_from = s_f.im * base_mva;
        br.p_to = s_t.re * base_mva;
        br.q_to = s_t.im * base_mva;
        br.losses = (s_f + s_t).re * base_mva;
        br.loading = if br.rating > 0.0 {
            s_f.norm() * base_mva / br.rating * 100.0
        } else {
            0.0
        };
    }
}
