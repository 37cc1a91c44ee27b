use crate::error::{GridError, Result};
use crate::math::{norm_inf, polar};
use crate::network::Branch;
use crate::options::PFOpt;
use crate::pf::PfSolution;
use crate::sbus::{mismatch_vector, power_mismatch};
use crate::traits::{LinearSolver, ProgressMonitor};
use crate::ybus::{make_ybus, Ybus};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

/// Builds the two matrices B prime and B double prime used in the fast
/// decoupled power flow (XB version), reduced to the pvpq and pq buses.
pub(crate) fn make_b(
    nb: usize,
    branch: &[Branch],
    pv: &[usize],
    pq: &[usize],
) -> (DMatrix<f64>, DMatrix<f64>) {
    let pv_pq = [pv, pq].concat();

    // Form Bp (B prime).
    let b_p = {
        let mut branch = branch.to_vec(); // modify a copy of branch
        for br in branch.iter_mut() {
            br.b = 0.0; // zero out line charging shunts
            br.r = 0.0; // zero out line resistance
        }
        let y_p = make_ybus(nb, &branch, false);
        select(&y_p, &pv_pq, &pv_pq)
    };

    // Form Bpp (B double prime).
    let b_pp = {
        let y_pp = make_ybus(nb, branch, false);
        select(&y_pp, pq, pq)
    };

    (b_p, b_pp)
}

/// `-imag(Y[rows, cols])` as a dense matrix.
fn select(y: &Ybus, rows: &[usize], cols: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), cols.len(), |r, c| -y.get(rows[r], cols[c]).im)
}

/// Solves power flow using the fast-decoupled method. B' and B'' are
/// factored once and reused for every half iteration.
pub(crate) fn fdpf(
    y_bus: &Ybus,
    s_bus: &[Complex64],
    v0: &[Complex64],
    b_p: DMatrix<f64>,
    b_pp: DMatrix<f64>,
    pv: &[usize],
    pq: &[usize],
    lin_solver: &dyn LinearSolver,
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<PfSolution> {
    let pv_pq = [pv, pq].concat();

    let tol = opt.tolerance;
    let max_it = opt.iteration_limit();

    let mut v = v0.to_vec();
    let mut va: Vec<f64> = v.iter().map(|v| v.arg()).collect();
    let mut vm: Vec<f64> = v.iter().map(|v| v.norm()).collect();

    let mut converged = false;
    let mut i = 0;

    // evaluate initial mismatch
    let mut mis = power_mismatch(y_bus, &v, s_bus);
    let mut norm_f = norm_inf(&mismatch_vector(&mis, &pv_pq, pq));
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        converged = true;
    }

    // reduce B matrices
    let singular = |_| GridError::SingularJacobian { iteration: 0 };
    let bp_lu = lin_solver.factor(b_p).map_err(singular)?;
    let bpp_lu = if pq.is_empty() {
        None
    } else {
        Some(lin_solver.factor(b_pp).map_err(singular)?)
    };

    while !converged && i < max_it {
        i += 1;

        // do P iteration, update Va
        let p = DVector::from_iterator(
            pv_pq.len(),
            pv_pq.iter().map(|&k| mis[k].re / vm[k]),
        );
        let dva = bp_lu
            .solve(&p)
            .map_err(|_| GridError::SingularJacobian { iteration: i })?;
        pv_pq.iter().zip(dva.iter()).for_each(|(&k, d)| va[k] -= d);
        v = polar(&vm, &va);

        mis = power_mismatch(y_bus, &v, s_bus);
        norm_f = norm_inf(&mismatch_vector(&mis, &pv_pq, pq));
        if norm_f < tol {
            converged = true;
            break;
        }

        // do Q iteration, update Vm
        if let Some(bpp_lu) = &bpp_lu {
            let q = DVector::from_iterator(pq.len(), pq.iter().map(|&k| mis[k].im / vm[k]));
            let dvm = bpp_lu
                .solve(&q)
                .map_err(|_| GridError::SingularJacobian { iteration: i })?;
            pq.iter().zip(dvm.iter()).for_each(|(&k, d)| vm[k] -= d);
            v = polar(&vm, &va);

            mis = power_mismatch(y_bus, &v, s_bus);
            norm_f = norm_inf(&mismatch_vector(&mis, &pv_pq, pq));
        }
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
        log::debug!("Fast-decoupled power flow converged in {} iterations.", i);
    } else {
        log::debug!(
            "Fast-decoupled power flow did not converge in {} iterations.",
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
