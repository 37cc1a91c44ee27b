use crate::error::{GridError, Result};
use crate::math::norm_inf;
use crate::options::PFOpt;
use crate::pf::PfSolution;
use crate::sbus::{mismatch_vector, power_mismatch};
use crate::traits::ProgressMonitor;
use crate::ybus::Ybus;
use num_complex::Complex64;
use num_traits::Zero;

/// Solves power flow using the Gauss-Seidel method.
///
/// PV buses take the reactive injection implied by the current estimate
/// and have their magnitude restored to the setpoint after every update.
/// `names` is used to identify isolated buses in errors.
pub(crate) fn gausspf(
    y_bus: &Ybus,
    s_bus: &[Complex64],
    v0: &[Complex64],
    pv: &[usize],
    pq: &[usize],
    names: &[&str],
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<PfSolution> {
    let pv_pq = [pv, pq].concat();
    let mut sweep: Vec<(usize, bool)> = pv
        .iter()
        .map(|&i| (i, true))
        .chain(pq.iter().map(|&i| (i, false)))
        .collect();
    sweep.sort_unstable();

    let tol = opt.tolerance;
    let max_it = opt.iteration_limit();

    let mut v = v0.to_vec();
    let vm_set: Vec<f64> = v.iter().map(|v| v.norm()).collect();
    let mut s = s_bus.to_vec();

    let mut converged = false;
    let mut i = 0;

    let mis = power_mismatch(y_bus, &v, s_bus);
    let mut norm_f = norm_inf(&mismatch_vector(&mis, &pv_pq, pq));
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        converged = true;
    }

    while !converged && i < max_it {
        i += 1;

        for &(k, is_pv) in &sweep {
            let row = y_bus.row(k);
            let y_kk = row
                .iter()
                .find(|(j, _)| *j == k)
                .map(|(_, y)| *y)
                .unwrap_or_else(Complex64::zero);
            if y_kk.is_zero() {
                return Err(GridError::IsolatedBus(names[k].to_string()));
            }
            let i_k: Complex64 = row.iter().map(|(j, y)| y * v[*j]).sum();

            if is_pv {
                s[k].im = (v[k] * i_k.conj()).im;
            }

            let others = i_k - y_kk * v[k];
            v[k] = ((s[k] / v[k]).conj() - others) / y_kk;

            if is_pv {
                v[k] = v[k] * (vm_set[k] / v[k].norm());
            }
        }

        let mis = power_mismatch(y_bus, &v, s_bus);
        norm_f = norm_inf(&mismatch_vector(&mis, &pv_pq, pq));
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
        log::debug!("Gauss-Seidel power flow converged in {} iterations.", i);
    } else {
        log::debug!("Gauss-Seidel power flow did not converge in {} iterations.", i);
    }

    Ok(PfSolution {
        v,
        converged,
        iterations: i,
        max_mismatch: norm_f,
    })
}
