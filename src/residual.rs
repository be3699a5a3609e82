//! Residual bookkeeping shared by the solvers

use std::time::{Duration, Instant};
use num_complex::Complex;
use num_traits::Zero;
use crate::lattice::{Field, Lattice};
use crate::solver::{Dir, LinAlg, LinOp, SolverError};

/// Calculates the true residual of `x` against `b`.
///
/// Returns \\(\\|b - A x\\| / \\|b\\|\\), or \\(\\|b - A x\\|\\) if \\(b = 0\\).
/// * `a` is \\(A\\) as a [`LinOp`].
/// * `b` and `x` are restricted to `a.subset()`.
pub fn rel_resid<L, A>(a: &A, b: &[Complex<L::F>], x: &[Complex<L::F>]) -> f64
where L: LinAlg, A: LinOp<L>
{
    assert_eq!(b.len(), a.size());
    assert_eq!(x.len(), a.size());

    let mut r = vec![Complex::zero(); b.len()];
    a.op(Dir::Forward, x, &mut r);
    L::xpay(b, -1., &mut r);

    let norm_r = L::norm(&r);
    let norm_b = L::norm(b);
    if norm_b > 0. {
        norm_r / norm_b
    }
    else {
        norm_r
    }
}

/// Squared absolute residual that a relative tolerance `rsd_target` allows for \\(\\|b\\|^2 = \\) `norm2_b`.
///
/// Absolute if \\(b = 0\\). Zero for a tolerance that is not positive.
pub(crate) fn rsd_sq(rsd_target: f64, norm2_b: f64) -> f64
{
    if !(rsd_target > 0.) {
        0.
    }
    else if norm2_b > 0. {
        rsd_target * rsd_target * norm2_b
    }
    else {
        rsd_target * rsd_target
    }
}

/// Whether a squared recursive residual meets a squared target from [`rsd_sq`].
///
/// A zero target is never met; only an exactly zero initial residual passes it.
pub(crate) fn reached(norm2_r: f64, rsd_sq: f64) -> bool
{
    rsd_sq > 0. && norm2_r <= rsd_sq
}

/// Whether a squared recursive residual has run below the normal `f64` range,
/// where the recursion stops making progress.
pub(crate) fn exhausted(norm2_r: f64) -> bool
{
    norm2_r < f64::MIN_POSITIVE
}

/// Relative residual from a squared residual norm.
pub(crate) fn rel_from_sq(norm2_r: f64, norm2_b: f64) -> f64
{
    if norm2_b > 0. {
        (norm2_r / norm2_b).sqrt()
    }
    else {
        norm2_r.sqrt()
    }
}

/// Fails with [`SolverError::DimensionMismatch`] unless `f` lives on `lattice`.
pub(crate) fn check_lattice<F: crate::solver::Real>(lattice: &Lattice, f: &Field<F>, name: &str)
-> Result<(), SolverError>
{
    if **f.lattice() != *lattice {
        log::error!("Lattice mismatch: {} on {:?}, operator on {:?}", name, f.lattice().dims(), lattice.dims());
        return Err(SolverError::DimensionMismatch);
    }
    Ok(())
}

/// Whether iteration `i` is due for periodic debug logging.
pub(crate) fn log_trig(i: usize, log_period: usize) -> bool
{
    log_period > 0 && i % log_period == 0
}

/// Warns once per solve that `log_period == 0` disables periodic logging.
pub(crate) fn check_log_period(log_period: usize)
{
    if log_period == 0 && log::log_enabled!(log::Level::Debug) {
        log::warn!("log_period == 0: no periodic log");
    }
}

//

/// Wall-clock limit of a solve.
pub(crate) struct Deadline
{
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline
{
    pub(crate) fn new(limit: Option<Duration>) -> Self
    {
        Deadline {
            start: Instant::now(),
            limit,
        }
    }

    pub(crate) fn expired(&self) -> bool
    {
        match self.limit {
            Some(limit) => self.start.elapsed() >= limit,
            None => false,
        }
    }

    pub(crate) fn elapsed(&self) -> Duration
    {
        self.start.elapsed()
    }
}

//

#[test]
fn test_rel_resid()
{
    use float_eq::assert_float_eq;
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let op = DiagOp::<L>::from_fn(&lat, Subset::Even, |_| Complex::new(2., 0.));

    let b = vec![Complex::new(1., 0.); 8];
    let mut x = vec![Complex::new(0.5, 0.); 8];
    assert_float_eq!(rel_resid::<L, _>(&op, &b, &x), 0., abs <= 1e-15);

    x[0] = Complex::new(0., 0.);
    assert_float_eq!(rel_resid::<L, _>(&op, &b, &x), 1. / 8f64.sqrt(), abs <= 1e-15);

    let zero = vec![Complex::zero(); 8];
    assert_float_eq!(rel_resid::<L, _>(&op, &zero, &x), 7f64.sqrt(), abs <= 1e-14);

    assert_float_eq!(rel_from_sq(4., 16.), 0.5, abs <= 0.);
    assert_float_eq!(rel_from_sq(4., 0.), 2., abs <= 0.);
    assert!(Deadline::new(Some(Duration::ZERO)).expired());
    assert!(!Deadline::new(None).expired());
}

#[test]
fn test_rsd_sq()
{
    assert_eq!(rsd_sq(0.5, 16.), 4.);
    assert_eq!(rsd_sq(0.5, 0.), 0.25);
    assert_eq!(rsd_sq(0., 16.), 0.);
    assert_eq!(rsd_sq(-0.5, 16.), 0.);
    assert_eq!(rsd_sq(f64::NAN, 16.), 0.);

    assert!(reached(4., 4.));
    assert!(!reached(4.5, 4.));
    // a zero target is not met even by an underflowed residual
    assert!(!reached(0., 0.));
    assert!(exhausted(0.));
    assert!(exhausted(f64::MIN_POSITIVE / 4.));
    assert!(!exhausted(1e-300));

    assert!(log_trig(200, 100));
    assert!(!log_trig(150, 100));
    assert!(!log_trig(0, 0));
}
