use crate::options::LinSolver;
use crate::traits::{Factor, LinearSolver};
use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};

/// Pivots smaller than this, relative to the largest, mark a singular matrix.
const PIVOT_TOL: f64 = 1e-12;

/// Returns the solver selected by `kind`.
pub fn linear_solver(kind: LinSolver) -> Box<dyn LinearSolver> {
    match kind {
        LinSolver::LU => Box::new(DenseLU {}),
        LinSolver::GE => Box::new(GaussElim {}),
    }
}

fn check_finite(x: DVector<f64>) -> Result<DVector<f64>, String> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(x)
    } else {
        Err("solution is not finite".to_string())
    }
}

/// LU factorization with partial pivoting from nalgebra.
#[derive(Default)]
pub struct DenseLU {}

struct DenseFactor {
    lu: LU<f64, Dyn, Dyn>,
}

impl LinearSolver for DenseLU {
    fn factor(&self, a_mat: DMatrix<f64>) -> Result<Box<dyn Factor>, String> {
        if a_mat.nrows() != a_mat.ncols() {
            return Err(format!(
                "matrix must be square ({}x{})",
                a_mat.nrows(),
                a_mat.ncols()
            ));
        }
        let lu = a_mat.lu();
        let u = lu.u();
        let diag = u.diagonal();
        let max = diag.iter().fold(0.0, |m: f64, d| m.max(d.abs()));
        if diag.iter().any(|d| d.abs() <= PIVOT_TOL * max) {
            return Err("matrix is singular".to_string());
        }
        Ok(Box::new(DenseFactor { lu }))
    }
}

impl Factor for DenseFactor {
    fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>, String> {
        let x = self
            .lu
            .solve(b)
            .ok_or_else(|| "matrix is singular".to_string())?;
        check_finite(x)
    }
}

/// Reference Gaussian elimination with partial pivoting. Slower than
/// `DenseLU` but transparent.
#[derive(Default)]
pub struct GaussElim {}

struct GaussFactor {
    /// Packed unit-lower and upper triangular factors.
    lu: DMatrix<f64>,
    /// Row permutation: position `k` holds original row `perm[k]`.
    perm: Vec<usize>,
}

impl LinearSolver for GaussElim {
    fn factor(&self, mut a: DMatrix<f64>) -> Result<Box<dyn Factor>, String> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(format!("matrix must be square ({}x{})", n, a.ncols()));
        }
        let scale = a.iter().fold(0.0, |m: f64, v| m.max(v.abs()));
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            let (p, max) = (k..n)
                .map(|i| (i, a[(i, k)].abs()))
                .fold((k, -1.0), |best, c| if c.1 > best.1 { c } else { best });
            if max <= PIVOT_TOL * scale || scale == 0.0 {
                return Err(format!("matrix is singular (pivot {})", k));
            }
            if p != k {
                a.swap_rows(p, k);
                perm.swap(p, k);
            }
            for i in k + 1..n {
                let factor = a[(i, k)] / a[(k, k)];
                a[(i, k)] = factor;
                for j in k + 1..n {
                    a[(i, j)] -= factor * a[(k, j)];
                }
            }
        }
        Ok(Box::new(GaussFactor { lu: a, perm }))
    }
}

impl Factor for GaussFactor {
    fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>, String> {
        let n = self.lu.nrows();
        if b.len() != n {
            return Err(format!("rhs has length {}, expected {}", b.len(), n));
        }
        let mut x = DVector::from_iterator(n, self.perm.iter().map(|&i| b[i]));
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[(i, j)] * x[j];
            }
        }
        for i in (0..n).rev() {
            for j in i + 1..n {
                x[i] -= self.lu[(i, j)] * x[j];
            }
            x[i] /= self.lu[(i, i)];
        }
        check_finite(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> (DMatrix<f64>, DVector<f64>) {
        let a = DMatrix::from_row_slice(3, 3, &[0.0, 2.0, 1.0, 4.0, 1.0, 0.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![5.0, 6.0, 10.0]);
        (a, b)
    }

    #[test]
    fn solvers_agree() {
        let (a, b) = system();
        let x1 = DenseLU {}.solve(a.clone(), &b).unwrap();
        let x2 = GaussElim {}.solve(a.clone(), &b).unwrap();
        assert!((&x1 - &x2).amax() < 1e-12);
        assert!((a * x1 - b).amax() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(DenseLU {}.solve(a.clone(), &b).is_err());
        assert!(GaussElim {}.solve(a, &b).is_err());
    }
}
