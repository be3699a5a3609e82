//! Conjugate gradient solver

use core::marker::PhantomData;
use std::time::Duration;
use num_complex::Complex;
use num_traits::Zero;
use crate::lattice::Field;
use crate::normalop::NormalOp;
use crate::residual::{check_lattice, check_log_period, exhausted, log_trig, reached, rel_from_sq, rel_resid, rsd_sq, Deadline};
use crate::solver::{Dir, LinAlg, LinOp, SolverError, SystemSolverResult};

//

/// Conjugate gradient parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CgParam
{
    /// Target relative residual \\(\\|r\\| / \\|b\\|\\).
    pub rsd_target: f64,
    /// Max iteration number. Reaching it without convergence is an error.
    pub max_iter: usize,
    /// Wall-clock limit of a solve. `None` means no limit.
    pub max_duration: Option<Duration>,
    /// Recompute the true residual after convergence.
    pub check_resid: bool,
    /// Period of iterations to output progress log(for debug/trace level).
    pub log_period: usize,
}

impl Default for CgParam
{
    fn default() -> Self
    {
        CgParam {
            rsd_target: 1e-8,
            max_iter: 10_000,
            max_duration: None,
            check_resid: true,
            log_period: 100,
        }
    }
}

//

/// Conjugate gradient solver struct.
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Solves \\(M^\dagger M x = b\\) on the working subset of \\(M\\)
/// ([`CgSolver::solve`]),
/// or \\(A x = b\\) for a Hermitian positive definite \\(A\\)
/// ([`CgSolver::solve_hermitian`]).
/// The solver holds no state across calls; every working vector lives for one call.
pub struct CgSolver<L: LinAlg>
{
    ph_l: PhantomData<L>,
    /// solver parameters.
    pub par: CgParam,
}

impl<L: LinAlg> CgSolver<L>
{
    /// Creates an instance.
    ///
    /// Returns [`CgSolver`] instance.
    pub fn new() -> Self
    {
        CgSolver {
            ph_l: PhantomData,
            par: CgParam::default(),
        }
    }

    /// Changes solver parameters.
    ///
    /// Returns [`CgSolver`] with its parameters changed.
    /// * `f` is a function to change parameters given by its argument.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut CgParam)
    {
        f(&mut self.par);
        self
    }

    /// Solves \\(M^\dagger M x = b\\).
    ///
    /// Returns `Ok` with [`SystemSolverResult`] of a converged solve,
    /// or `Err` with [`SolverError`] type.
    /// * `m` is \\(M\\) as a [`LinOp`].
    /// * `b` is \\(b\\). Only its restriction to `m.subset()` is read.
    /// * `x` is an initial guess before entry, the solution on exit.
    ///   Only its restriction to `m.subset()` is touched.
    pub fn solve<O>(&self, m: &O, b: &Field<L::F>, x: &mut Field<L::F>)
    -> Result<SystemSolverResult, SolverError>
    where O: LinOp<L>
    {
        let a = NormalOp::<L, _>::new(m, 0.);
        self.solve_hermitian(&a, b, x)
    }

    /// Solves \\(A x = b\\) for a Hermitian positive definite \\(A\\).
    ///
    /// Same as [`CgSolver::solve`] except `a` is used as is instead of \\(M^\dagger M\\).
    pub fn solve_hermitian<A>(&self, a: &A, b: &Field<L::F>, x: &mut Field<L::F>)
    -> Result<SystemSolverResult, SolverError>
    where A: LinOp<L>
    {
        check_lattice(a.lattice(), b, "b")?;
        check_lattice(a.lattice(), x, "x")?;

        let s = a.subset();
        self.solve_slice(a, b.sub(s), x.sub_mut(s))
    }

    fn solve_slice<A>(&self, a: &A, b: &[Complex<L::F>], x: &mut [Complex<L::F>])
    -> Result<SystemSolverResult, SolverError>
    where A: LinOp<L>
    {
        log::info!("----- Initializing");
        log::debug!("{:?}", self.par);
        check_log_period(self.par.log_period);

        let n = a.size();
        let deadline = Deadline::new(self.par.max_duration);

        let mut r = vec![Complex::zero(); n];
        let mut p = vec![Complex::zero(); n];
        let mut q = vec![Complex::zero(); n];

        let norm2_b = L::norm2(b);
        let rsd_sq = rsd_sq(self.par.rsd_target, norm2_b);

        // r = b - A x, p = r
        a.op(Dir::Forward, x, &mut q);
        L::copy(b, &mut r);
        L::add(-1., &q, &mut r);
        L::copy(&r, &mut p);

        let mut rho = L::norm2(&r);
        log::debug!("0: |b|^2 {:.3e} |r|^2 {:.3e} target {:.3e}", norm2_b, rho, rsd_sq);

        if !rho.is_finite() {
            log::warn!("----- Breakdown: initial residual {:.3e}", rho);

            return Err(SolverError::Breakdown {iter: 0});
        }

        let mut n_count = 0;
        let mut done = rho == 0. || reached(rho, rsd_sq);

        log::info!("----- Started");
        while !done {
            if n_count >= self.par.max_iter {
                let resid = rel_from_sq(rho, norm2_b);
                log::warn!("----- ConvergenceFailure: {} iterations, residual {:.3e}", n_count, resid);

                return Err(SolverError::ConvergenceFailure {shift: None, iter: n_count, resid});
            }
            if deadline.expired() {
                let resid = rel_from_sq(rho, norm2_b);
                log::warn!("----- Timeout: {:?}, {} iterations, residual {:.3e}", deadline.elapsed(), n_count, resid);

                return Err(SolverError::Timeout {iter: n_count, resid});
            }

            // q = A p
            a.op(Dir::Forward, &p, &mut q);

            let p_q = L::inner_re(&p, &q);
            if !(p_q > 0.) || !p_q.is_finite() {
                log::warn!("----- Breakdown: <p, Ap> = {:.3e} at {}", p_q, n_count);

                return Err(SolverError::Breakdown {iter: n_count});
            }

            let alpha = rho / p_q;
            L::add(alpha, &p, x);
            L::add(-alpha, &q, &mut r);

            let rho_next = L::norm2(&r);
            n_count += 1;

            if !rho_next.is_finite() {
                log::warn!("----- Breakdown: residual {:.3e} at {}", rho_next, n_count);

                return Err(SolverError::Breakdown {iter: n_count});
            }

            done = reached(rho_next, rsd_sq);

            if log_trig(n_count, self.par.log_period) || done {
                log::debug!("{}: resid {:.3e}", n_count, rel_from_sq(rho_next, norm2_b));
            }
            else {
                log::trace!("{}: resid {:.3e}", n_count, rel_from_sq(rho_next, norm2_b));
            }

            if !done {
                if exhausted(rho_next) {
                    let resid = rel_resid::<L, _>(a, b, x);
                    log::warn!("----- ConvergenceFailure: recursion exhausted at {}, true residual {:.3e}", n_count, resid);

                    return Err(SolverError::ConvergenceFailure {shift: None, iter: n_count, resid});
                }

                let beta = rho_next / rho;
                L::xpay(&r, beta, &mut p);
            }
            rho = rho_next;
        }

        let resid = if self.par.check_resid {
            rel_resid::<L, _>(a, b, x)
        }
        else {
            rel_from_sq(rho, norm2_b)
        };
        log::info!("----- Converged: {} iterations, true residual {:.3e}", n_count, resid);

        Ok(SystemSolverResult {
            n_count,
            converged: true,
            resid,
        })
    }
}

impl<L: LinAlg> Default for CgSolver<L>
{
    fn default() -> Self
    {
        Self::new()
    }
}

//

#[test]
fn test_cg_identity()
{
    use float_eq::assert_float_eq;
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 4, 4]);
    assert_eq!(lat.subset_len(Subset::Even), 128);

    let m = DiagOp::<L>::identity(&lat, Subset::Full);
    let mut b = Field::zeros(&lat);
    b.fill(Subset::Full, Complex::new(1., 0.));
    let mut x = Field::zeros(&lat);

    let s = CgSolver::<L>::new().par(|p| {p.rsd_target = 1e-10; p.max_iter = 10});
    let rslt = s.solve(&m, &b, &mut x).unwrap();

    assert_eq!(rslt.n_count, 1);
    assert!(rslt.converged);
    assert_float_eq!(rslt.resid, 0., abs <= 1e-15);
    assert_eq!(x, b);
}

#[test]
fn test_cg_diag()
{
    use float_eq::assert_float_eq;
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Even, |c| Complex::new(1. + c[0] as f64, 0.5 * c[1] as f64));
    let b = Field::from_fn(&lat, |c| Complex::new(1., c[2] as f64 - c[3] as f64));
    let mut x = Field::zeros(&lat);

    let s = CgSolver::<L>::new().par(|p| {p.rsd_target = 1e-12});
    let rslt = s.solve(&m, &b, &mut x).unwrap();
    assert!(rslt.resid <= 1e-12);

    for ((d, u), v) in m.diag().iter().zip(x.sub(Subset::Even)).zip(b.sub(Subset::Even)) {
        let expect = *v / d.norm_sqr();
        assert_float_eq!(u.re, expect.re, abs <= 1e-10);
        assert_float_eq!(u.im, expect.im, abs <= 1e-10);
    }
    // odd checkerboard untouched
    assert!(x.sub(Subset::Odd).iter().all(|u| u.is_zero()));
}

#[test]
fn test_cg_failure()
{
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Full, |c| Complex::new(1. + c[0] as f64 + 2. * c[1] as f64, 0.));
    let b = Field::from_fn(&lat, |c| Complex::new(1. + c[3] as f64, 0.));

    let mut x = Field::zeros(&lat);
    let rslt = CgSolver::<L>::new().par(|p| {p.max_iter = 0}).solve(&m, &b, &mut x);
    assert_eq!(rslt, Err(SolverError::ConvergenceFailure {shift: None, iter: 0, resid: 1.}));

    // tolerance 0 is never met, however long it runs
    let mut x = Field::zeros(&lat);
    let rslt = CgSolver::<L>::new().par(|p| {p.rsd_target = 0.; p.max_iter = 5000}).solve(&m, &b, &mut x);
    assert!(matches!(rslt, Err(SolverError::ConvergenceFailure {shift: None, ..})));

    let mut x = Field::zeros(&lat);
    // four distinct eigenvalues, two iterations are not enough
    let rslt = CgSolver::<L>::new().par(|p| {p.rsd_target = 1e-14; p.max_iter = 2}).solve(&m, &b, &mut x);
    assert!(matches!(rslt, Err(SolverError::ConvergenceFailure {shift: None, iter: 2, ..})));

    let other = Lattice::shared(&[2, 2, 2, 4]);
    let mut x = Field::zeros(&other);
    let rslt = CgSolver::<L>::new().solve(&m, &b, &mut x);
    assert_eq!(rslt, Err(SolverError::DimensionMismatch));
}

#[test]
fn test_cg_not_finite()
{
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Full, |c| Complex::new(1. + c[0] as f64, 0.));
    let b = Field::from_fn(&lat, |_| Complex::new(1., 0.));
    let s = CgSolver::<L>::new();

    let mut x = Field::zeros(&lat);
    x.sub_mut(Subset::Full)[3] = Complex::new(f64::NAN, 0.);
    assert_eq!(s.solve(&m, &b, &mut x), Err(SolverError::Breakdown {iter: 0}));

    let mut b_nan = b.clone();
    b_nan.sub_mut(Subset::Full)[5] = Complex::new(0., f64::INFINITY);
    let mut x = Field::zeros(&lat);
    assert_eq!(s.solve(&m, &b_nan, &mut x), Err(SolverError::Breakdown {iter: 0}));
}
