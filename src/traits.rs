use nalgebra::{DMatrix, DVector};

/// A factorized coefficient matrix that can be solved against repeatedly.
pub trait Factor {
    fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>, String>;
}

/// Strategy for solving the real linear systems in the Newton and
/// fast-decoupled updates.
pub trait LinearSolver: Send + Sync {
    fn factor(&self, a_mat: DMatrix<f64>) -> Result<Box<dyn Factor>, String>;

    fn solve(&self, a_mat: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, String> {
        self.factor(a_mat)?.solve(b)
    }
}

pub trait ProgressMonitor {
    fn update(&self, i: usize, norm_f: f64);
}

/// Reports the iteration mismatch through the `log` facade.
pub struct LogProgress {}

impl ProgressMonitor for LogProgress {
    fn update(&self, i: usize, norm_f: f64) {
        if i == 0 {
            log::trace!(" it    max P & Q mismatch (p.u.)");
            log::trace!("----  ---------------------------");
        }
        log::trace!("{:3}        {:10.3e}", i, norm_f);
    }
}
