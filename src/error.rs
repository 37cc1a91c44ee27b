use thiserror::Error;

/// Structural and numerical failures of the grid engine.
///
/// Non-convergence is not an error: solvers report it through
/// `ConvergenceResult::converged`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("bus {0} already exists")]
    DuplicateBus(String),

    #[error("branch {0} already exists")]
    DuplicateBranch(String),

    #[error("bus {0} not found")]
    UnknownBus(String),

    #[error("branch {0} not found")]
    UnknownBranch(String),

    /// `element` is the branch or bus whose change would give one island
    /// two slack buses.
    #[error("{element} would leave an island with more than one slack bus")]
    MultipleSlack { element: String },

    #[error("network has no slack bus")]
    NoSlack,

    #[error("network has no buses")]
    EmptyNetwork,

    #[error("singular Jacobian at iteration {iteration}")]
    SingularJacobian { iteration: usize },

    #[error("bus {0} has zero self-admittance")]
    IsolatedBus(String),

    #[error("linear solver failed: {0}")]
    LinearSolver(String),

    #[error("worker pool: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, GridError>;

/// A request that was declined without anything being changed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Refusal {
    #[error("insufficient budget: need {need:.0}, have {have:.0}")]
    InsufficientBudget { need: f64, have: f64 },

    #[error("unknown endpoint {0}")]
    UnknownEndpoint(String),

    #[error("id {0} is already in use")]
    DuplicateId(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("line endpoints must differ")]
    SelfLoop,

    #[error("blackstart capability has not been assessed")]
    NotAssessed,

    #[error("no restoration sequence available")]
    NoSequence,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("real-time loop is already running")]
    AlreadyRunning,
}
