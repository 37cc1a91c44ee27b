use crate::cmplx;
use crate::network::Branch;
use nalgebra::DMatrix;
use num_complex::Complex64;
use sprs::{CsMat, TriMat};

/// Bus admittance matrix in dense or compressed sparse row storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Ybus {
    Dense(DMatrix<Complex64>),
    Sparse(CsMat<Complex64>),
}

impl Ybus {
    pub fn dim(&self) -> usize {
        match self {
            Ybus::Dense(m) => m.nrows(),
            Ybus::Sparse(m) => m.rows(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Ybus::Sparse(_))
    }

    /// Number of stored non-zero elements.
    pub fn nnz(&self) -> usize {
        match self {
            Ybus::Dense(m) => m.iter().filter(|y| y.norm_sqr() != 0.0).count(),
            Ybus::Sparse(m) => m.nnz(),
        }
    }

    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        match self {
            Ybus::Dense(m) => m[(i, j)],
            Ybus::Sparse(m) => m.get(i, j).copied().unwrap_or_default(),
        }
    }

    /// Non-zero elements of row `i` as (column, value) pairs.
    pub fn row(&self, i: usize) -> Vec<(usize, Complex64)> {
        match self {
            Ybus::Dense(m) => m
                .row(i)
                .iter()
                .enumerate()
                .filter(|(_, y)| y.norm_sqr() != 0.0)
                .map(|(j, y)| (j, *y))
                .collect(),
            Ybus::Sparse(m) => match m.outer_view(i) {
                Some(row) => row.iter().map(|(j, y)| (j, *y)).collect(),
                None => Vec::new(),
            },
        }
    }

    /// Computes `Y * v`.
    pub fn mul_vec(&self, v: &[Complex64]) -> Vec<Complex64> {
        (0..self.dim())
            .map(|i| self.row(i).iter().map(|(j, y)| y * v[*j]).sum())
            .collect()
    }

    pub fn to_dense(&self) -> DMatrix<Complex64> {
        match self {
            Ybus::Dense(m) => m.clone(),
            Ybus::Sparse(_) => {
                let n = self.dim();
                let mut d = DMatrix::zeros(n, n);
                for i in 0..n {
                    for (j, y) in self.row(i) {
                        d[(i, j)] = y;
                    }
                }
                d
            }
        }
    }
}

/// Series admittance and half line charging of an in-service branch.
fn branch_admittance(br: &Branch) -> (Complex64, Complex64) {
    let y_b = 1.0 / br.impedance();
    let y_sh = cmplx!(0.0, br.b / 2.0);
    (y_b, y_sh)
}

/// Builds the bus admittance matrix. Out of service branches and branches
/// with a negligible series impedance are skipped.
pub fn make_ybus(nb: usize, branch: &[Branch], sparse: bool) -> Ybus {
    let in_service = branch.iter().filter(|br| br.in_service());

    if sparse {
        let mut tri = TriMat::new((nb, nb));
        for br in in_service {
            let (y_b, y_sh) = branch_admittance(br);
            let (f, t) = (br.from, br.to);
            tri.add_triplet(f, t, -y_b);
            tri.add_triplet(t, f, -y_b);
            tri.add_triplet(f, f, y_b + y_sh);
            tri.add_triplet(t, t, y_b + y_sh);
        }
        let y_bus: CsMat<Complex64> = tri.to_csr();
        log::debug!("Ybus: sparse {}x{}, {} non-zeros", nb, nb, y_bus.nnz());
        Ybus::Sparse(y_bus)
    } else {
        let mut y_bus = DMatrix::<Complex64>::zeros(nb, nb);
        for br in in_service {
            let (y_b, y_sh) = branch_admittance(br);
            let (f, t) = (br.from, br.to);
            y_bus[(f, t)] -= y_b;
            y_bus[(t, f)] -= y_b;
            y_bus[(f, f)] += y_b + y_sh;
            y_bus[(t, t)] += y_b + y_sh;
        }
        log::debug!("Ybus: dense {}x{}", nb, nb);
        Ybus::Dense(y_bus)
    }
}
