use crate::math::J;
use crate::ybus::Ybus;
use nalgebra::DMatrix;
use num_complex::Complex64;

/// Builds the power flow Jacobian in polar coordinates.
///
/// The partial derivatives of complex bus power injections are
///
/// ```text
/// dS/dVa = j diag(V) conj(diag(I) - Ybus diag(V))
/// dS/dVm = diag(V) conj(Ybus diag(V/|V|)) + conj(diag(I)) diag(V/|V|)
/// ```
///
/// and the Jacobian is assembled as
///
/// ```text
/// | Re(dS/dVa)[pvpq, pvpq]  Re(dS/dVm)[pvpq, pq] |
/// | Im(dS/dVa)[pq, pvpq]    Im(dS/dVm)[pq, pq]   |
/// ```
pub fn make_jac(y_bus: &Ybus, v: &[Complex64], pv: &[usize], pq: &[usize]) -> DMatrix<f64> {
    let nb = v.len();
    let npvpq = pv.len() + pq.len();
    let n = npvpq + pq.len();

    // Position of each bus in the angle and magnitude blocks.
    let mut a_pos: Vec<Option<usize>> = vec![None; nb];
    let mut m_pos: Vec<Option<usize>> = vec![None; nb];
    for (k, &i) in pv.iter().chain(pq).enumerate() {
        a_pos[i] = Some(k);
    }
    for (k, &i) in pq.iter().enumerate() {
        m_pos[i] = Some(npvpq + k);
    }

    let i_bus = y_bus.mul_vec(v);
    let v_norm: Vec<Complex64> = v
        .iter()
        .map(|vi| if vi.norm() > 0.0 { vi / vi.norm() } else { *vi })
        .collect();

    let mut jac = DMatrix::<f64>::zeros(n, n);
    let mut add = |i: usize, j: usize, ds_dva: Complex64, ds_dvm: Complex64| {
        if let Some(r) = a_pos[i] {
            if let Some(c) = a_pos[j] {
                jac[(r, c)] += ds_dva.re;
            }
            if let Some(c) = m_pos[j] {
                jac[(r, c)] += ds_dvm.re;
            }
        }
        if let Some(r) = m_pos[i] {
            if let Some(c) = a_pos[j] {
                jac[(r, c)] += ds_dva.im;
            }
            if let Some(c) = m_pos[j] {
                jac[(r, c)] += ds_dvm.im;
            }
        }
    };

    for i in 0..nb {
        if a_pos[i].is_none() {
            continue;
        }
        for (j, y) in y_bus.row(i) {
            let ds_dva = J * v[i] * (-(y * v[j])).conj();
            let ds_dvm = v[i] * (y * v_norm[j]).conj();
            add(i, j, ds_dva, ds_dvm);
        }
        let ds_dva = J * v[i] * i_bus[i].conj();
        let ds_dvm = i_bus[i].conj() * v_norm[i];
        add(i, i, ds_dva, ds_dvm);
    }

    jac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::polar;
    use crate::network::Branch;
    use crate::sbus::{mismatch_vector, power_injection};
    use crate::ybus::make_ybus;

    fn three_bus() -> Ybus {
        let mut branches = vec![
            Branch::new("a", "1", "2", 0.02, 0.2, 0.02),
            Branch::new("b", "2", "3", 0.01, 0.1, 0.0),
            Branch::new("c", "1", "3", 0.03, 0.25, 0.01),
        ];
        for (br, (f, t)) in branches.iter_mut().zip([(0, 1), (1, 2), (0, 2)]) {
            br.from = f;
            br.to = t;
        }
        make_ybus(3, &branches, false)
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let y_bus = three_bus();
        let (pv, pq) = (vec![1], vec![2]);
        let pvpq = [pv.clone(), pq.clone()].concat();
        let vm = [1.02, 1.01, 0.97];
        let va = [0.0, -0.05, -0.1];

        let jac = make_jac(&y_bus, &polar(&vm, &va), &pv, &pq);
        let f = |vm: &[f64], va: &[f64]| {
            let s = power_injection(&y_bus, &polar(vm, va));
            mismatch_vector(&s, &pvpq, &pq)
        };
        let f0 = f(&vm, &va);
        let h = 1e-7;

        // columns: Va(1), Va(2), Vm(2)
        for (col, (bus, is_angle)) in [(1, true), (2, true), (2, false)].into_iter().enumerate() {
            let (mut vm2, mut va2) = (vm.to_vec(), va.to_vec());
            if is_angle {
                va2[bus] += h;
            } else {
                vm2[bus] += h;
            }
            let f1 = f(&vm2, &va2);
            for row in 0..f0.len() {
                let fd = (f1[row] - f0[row]) / h;
                assert!(
                    (fd - jac[(row, col)]).abs() < 1e-4,
                    "J[{},{}] = {} but finite difference gives {}",
                    row,
                    col,
                    jac[(row, col)],
                    fd
                );
            }
        }
    }
}
