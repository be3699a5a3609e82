/// Solver errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolverError
{
    /// Exceed max iterations before reaching the tolerance.
    ConvergenceFailure {
        /// Index of the first unconverged shift, `None` for a single-shift solve.
        shift: Option<usize>,
        /// Iterations performed.
        iter: usize,
        /// Relative residual achieved.
        resid: f64,
    },
    /// Even-even block of an even-odd operator is not exactly invertible.
    PreconditioningInapplicable,
    /// Sizes of fields, shifts or tolerances disagree, or a field lives on another lattice.
    DimensionMismatch,

    /// Non-positive or non-finite curvature of a search direction.
    Breakdown {
        /// Iteration at which it was found.
        iter: usize,
    },
    /// Exceed the wall-clock limit.
    Timeout {
        /// Iterations performed.
        iter: usize,
        /// Relative residual achieved.
        resid: f64,
    },
}

impl core::fmt::Display for SolverError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self {
            SolverError::ConvergenceFailure {shift: None, iter, resid} =>
                write!(f, "ConvergenceFailure: not converged in {} iterations, residual {:.3e}", iter, resid),
            SolverError::ConvergenceFailure {shift: Some(i), iter, resid} =>
                write!(f, "ConvergenceFailure: shift #{} not converged in {} iterations, residual {:.3e}", i, iter, resid),
            SolverError::PreconditioningInapplicable =>
                write!(f, "PreconditioningInapplicable: even-even block is not exactly invertible"),
            SolverError::DimensionMismatch =>
                write!(f, "DimensionMismatch: sizes of fields, shifts or tolerances disagree"),
            SolverError::Breakdown {iter} =>
                write!(f, "Breakdown: non-positive curvature at iteration {}", iter),
            SolverError::Timeout {iter, resid} =>
                write!(f, "Timeout: exceed time limit after {} iterations, residual {:.3e}", iter, resid),
        }
    }
}

impl std::error::Error for SolverError {}

//

#[test]
fn test_solver_error_display()
{
    let e = SolverError::ConvergenceFailure {shift: Some(2), iter: 100, resid: 1.5e-3};
    assert_eq!(e.to_string(), "ConvergenceFailure: shift #2 not converged in 100 iterations, residual 1.500e-3");

    let e = SolverError::ConvergenceFailure {shift: None, iter: 0, resid: 1.};
    assert_eq!(e.to_string(), "ConvergenceFailure: not converged in 0 iterations, residual 1.000e0");
}
