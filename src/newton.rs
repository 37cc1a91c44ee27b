use crate::error::{GridError, Result};
use crate::jac::make_jac;
use crate::math::{norm_inf, polar};
use crate::options::PFOpt;
use crate::pf::PfSolution;
use crate::sbus::{mismatch_vector, power_mismatch};
use crate::traits::{LinearSolver, ProgressMonitor};
use crate::ybus::Ybus;
use nalgebra::DVector;
use num_complex::Complex64;

/// Solves power flow using full Newton's method (power/polar).
pub(crate) fn newtonpf(
    y_bus: &Ybus,
    s_bus: &[Complex64],
    v0: &[Complex64],
    pv: &[usize],
    pq: &[usize],
    lin_solver: &dyn LinearSolver,
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<PfSolution> {
    let pv_pq = [pv, pq].concat();

    let tol = opt.tolerance;
    let max_it = opt.iteration_limit();

    let mut converged = false;
    let mut i = 0;
    let mut v = v0.to_vec();
    let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();

    // set up indexing for updating V
    let npvpq = pv_pq.len();

    // evaluate F(x0)
    let mis = power_mismatch(y_bus, &v, s_bus);
    let mut f = mismatch_vector(&mis, &pv_pq, pq);

    // check tolerance
    let mut norm_f = norm_inf(&f);
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        converged = true;
    }

    // do Newton iterations
    while !converged && i < max_it {
        i += 1;

        let jac = make_jac(y_bus, &v, pv, pq);

        // compute update step
        let rhs = DVector::from_iterator(f.len(), f.iter().map(|f_i| -f_i));
        let dx = lin_solver
            .solve(jac, &rhs)
            .map_err(|_| GridError::SingularJacobian { iteration: i })?;

        // update voltage
        pv_pq.iter().zip(0..npvpq).for_each(|(&b, j)| va[b] += dx[j]);
        pq.iter().zip(npvpq..).for_each(|(&b, j)| vm[b] += dx[j]);

        // update Vm and Va again in case we wrapped around with a negative Vm
        v = polar(&vm, &va);
        va = v.iter().map(|v| v.arg()).collect();
        vm = v.iter().map(|v| v.norm()).collect();

        // evaluate F(x)
        let mis = power_mismatch(y_bus, &v, s_bus);
        f = mismatch_vector(&mis, &pv_pq, pq);

        // check for convergence
        norm_f = norm_inf(&f);
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if !norm_f.is_finite() {
            break;
        }
        if norm_f < tol {
            converged = true;
        }
    }

    if converged {
        log::debug!(
            "Newton's method power flow (power balance, polar) converged in {} iterations.",
            i
        );
    } else {
        log::debug!(
            "Newton's method power flow (power balance, polar) did not converge in {} iterations.",
            i
        );
    }

    Ok(PfSolution {
        v,
        converged,
        iterations: i,
        max_mismatch: norm_f,
    })
}
