use derive_builder::Builder;

/// AC power flow algorithm.
#[derive(Debug, PartialEq, Eq, Copy, Clone, clap::ValueEnum)]
pub enum Alg {
    /// Newton's method (power balance, polar).
    NR,
    /// Fast-decoupled method (XB version).
    FD,
    /// Gauss-Seidel method.
    GS,
}

impl std::fmt::Display for Alg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alg::NR => write!(f, "Newton-Raphson"),
            Alg::FD => write!(f, "fast-decoupled"),
            Alg::GS => write!(f, "Gauss-Seidel"),
        }
    }
}

/// Linear solver used for the Newton and fast-decoupled updates.
#[derive(Debug, PartialEq, Eq, Copy, Clone, clap::ValueEnum)]
pub enum LinSolver {
    /// LU factorization with partial pivoting (nalgebra).
    LU,
    /// Reference Gaussian elimination.
    GE,
}

#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct PFOpt {
    /// AC power flow algorithm.
    pub algorithm: Alg,

    /// Termination tolerance on per unit P & Q mismatch. Default value is 1e-6.
    pub tolerance: f64,

    /// Maximum number of iterations. Gauss-Seidel is allowed twice as many
    /// sweeps. Default value is 20.
    pub max_it: usize,

    /// Start from 1.0∠0 at load buses rather than the stored state.
    pub flat_start: bool,

    pub lin_solver: LinSolver,
}

impl Default for PFOpt {
    fn default() -> Self {
        Self {
            algorithm: Alg::NR,
            tolerance: 1e-6,
            max_it: 20,
            flat_start: true,
            lin_solver: LinSolver::LU,
        }
    }
}

impl PFOpt {
    /// Iteration limit for the configured algorithm.
    pub fn iteration_limit(&self) -> usize {
        match self.algorithm {
            Alg::GS => 2 * self.max_it,
            Alg::NR | Alg::FD => self.max_it,
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct ContingencyOpt {
    /// Upper bound on worker threads for parallel analysis.
    pub max_workers: usize,
}

impl Default for ContingencyOpt {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_workers: usize::min(8, cpus),
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct GridOpt {
    /// System MVA base used for converting power into per-unit quantities.
    /// Default value is 100.
    pub base_mva: f64,

    /// Networks with more buses than this use sparse admittance storage.
    pub sparse_threshold: usize,

    pub pf: PFOpt,
    pub contingency: ContingencyOpt,
}

impl Default for GridOpt {
    fn default() -> Self {
        Self {
            base_mva: 100.0,
            sparse_threshold: 100,
            pf: PFOpt::default(),
            contingency: ContingencyOpt::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let opt = PFOptBuilder::default()
            .algorithm(Alg::GS)
            .max_it(15)
            .build()
            .unwrap();
        assert_eq!(opt.tolerance, 1e-6);
        assert_eq!(opt.iteration_limit(), 30);
        assert!(ContingencyOpt::default().max_workers <= 8);
    }
}
