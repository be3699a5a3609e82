/// Outcome of one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSolverResult
{
    /// Number of iterations performed.
    pub n_count: usize,
    /// Whether the tolerance was reached.
    pub converged: bool,
    /// Relative residual \\(\\|b - A x\\| / \\|b\\|\\) of the returned solution,
    /// or \\(\\|b - A x\\|\\) when \\(b = 0\\).
    pub resid: f64,
}
