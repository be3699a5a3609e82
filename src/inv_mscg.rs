//! Multi-shift conjugate gradient solver

use core::marker::PhantomData;
use std::time::Duration;
use num_complex::Complex;
use num_traits::Zero;
use crate::lattice::Field;
use crate::normalop::NormalOp;
use crate::residual::{check_lattice, check_log_period, exhausted, log_trig, reached, rel_from_sq, rel_resid, rsd_sq, Deadline};
use crate::solver::{Dir, LinAlg, LinOp, Real, SolverError, SystemSolverResult};

//

/// Multi-shift conjugate gradient parameters.
///
/// Tolerances are given per shift to [`MultiShiftCgSolver::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct MultiShiftParam
{
    /// Max iteration number of the shared Krylov sequence.
    pub max_iter: usize,
    /// Wall-clock limit of a solve. `None` means no limit.
    pub max_duration: Option<Duration>,
    /// Recompute the true residual of each shift after the iteration.
    pub check_resid: bool,
    /// Return per-shift results instead of an error when some shifts fail to converge.
    pub allow_partial: bool,
    /// Period of iterations to output progress log(for debug/trace level).
    pub log_period: usize,
}

impl Default for MultiShiftParam
{
    fn default() -> Self
    {
        MultiShiftParam {
            max_iter: 10_000,
            max_duration: None,
            check_resid: true,
            allow_partial: false,
            log_period: 100,
        }
    }
}

//

#[derive(Debug, Clone, Copy)]
struct Coef
{
    alpha: f64,
    alpha_prev: f64,
    beta: f64,
    beta_prev: f64,
}

struct ShiftState<'a, F: Real>
{
    sigma: f64,
    rsd_sq: f64,
    zeta: f64,
    zeta_prev: f64,
    p: Vec<Complex<F>>,
    x: &'a mut [Complex<F>],
    retired: Option<usize>,
    stalled: bool,
    norm2_r: f64,
}

impl<'a, F: Real> ShiftState<'a, F>
{
    fn active(&self) -> bool
    {
        self.retired.is_none() && !self.stalled
    }

    // r is the residual of the unshifted system after this iteration
    fn step<L: LinAlg<F=F>>(&mut self, c: &Coef, r: &[Complex<F>], rho: f64, iter: usize)
    {
        let zeta_next = self.zeta * self.zeta_prev * c.alpha_prev
            / (c.alpha_prev * self.zeta_prev * (1. + self.sigma * c.alpha)
               + c.alpha * c.beta_prev * (self.zeta_prev - self.zeta));

        let ratio = zeta_next / self.zeta;
        let alpha_s = c.alpha * ratio;
        let beta_s = c.beta * ratio * ratio;

        L::add(alpha_s, &self.p, self.x);
        L::axpby(zeta_next, r, beta_s, &mut self.p);

        self.zeta_prev = self.zeta;
        self.zeta = zeta_next;
        self.norm2_r = zeta_next * zeta_next * rho;

        if reached(self.norm2_r, self.rsd_sq) {
            self.retired = Some(iter);
        }
        else if exhausted(self.norm2_r) {
            // zeta has underflowed, further steps would divide by zero
            self.stalled = true;
        }
    }
}

//

/// Multi-shift conjugate gradient solver struct.
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Solves the family \\((M^\dagger M + \sigma_i I) x_i = b\\) for all shifts \\(\sigma_i\\) at once,
/// applying \\(M^\dagger M\\) once per iteration.
/// Every \\(x_i\\) starts from zero; initial guesses are not supported.
/// With the `rayon` feature, per-shift updates of one iteration run in parallel.
#[derive(Clone)]
pub struct MultiShiftCgSolver<L: LinAlg>
{
    ph_l: PhantomData<L>,
    /// solver parameters.
    pub par: MultiShiftParam,
}

impl<L: LinAlg> MultiShiftCgSolver<L>
{
    /// Creates an instance.
    ///
    /// Returns [`MultiShiftCgSolver`] instance.
    pub fn new() -> Self
    {
        MultiShiftCgSolver {
            ph_l: PhantomData,
            par: MultiShiftParam::default(),
        }
    }

    /// Changes solver parameters.
    ///
    /// Returns [`MultiShiftCgSolver`] with its parameters changed.
    /// * `f` is a function to change parameters given by its argument.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut MultiShiftParam)
    {
        f(&mut self.par);
        self
    }

    /// Solves \\((M^\dagger M + \sigma_i I) x_i = b\\).
    ///
    /// Returns `Ok` with [`SystemSolverResult`] of each shift,
    /// or `Err` with [`SolverError`] type.
    /// Unless [`MultiShiftParam::allow_partial`] is set,
    /// a shift not converged within [`MultiShiftParam::max_iter`] fails the whole solve.
    /// * `m` is \\(M\\) as a [`LinOp`].
    /// * `b` is \\(b\\). Only its restriction to `m.subset()` is read.
    /// * `shifts` are \\(\sigma_i\\).
    /// * `rsd_targets` are target relative residuals of each shift.
    /// * `xs` are \\(x_i\\) on exit. Their restrictions to `m.subset()` are zeroed on entry.
    ///
    /// `shifts`, `rsd_targets` and `xs` shall have the same length.
    pub fn solve<O>(&self, m: &O, b: &Field<L::F>, shifts: &[f64], rsd_targets: &[f64], xs: &mut [Field<L::F>])
    -> Result<Vec<SystemSolverResult>, SolverError>
    where O: LinOp<L>
    {
        if shifts.len() != rsd_targets.len() || shifts.len() != xs.len() {
            log::error!("Size mismatch: {} shifts, {} rsd_targets, {} solutions", shifts.len(), rsd_targets.len(), xs.len());
            return Err(SolverError::DimensionMismatch);
        }
        check_lattice(m.lattice(), b, "b")?;
        for x in xs.iter() {
            check_lattice(m.lattice(), x, "xs")?;
        }

        log::info!("----- Initializing");
        log::debug!("{:?}", self.par);
        log::debug!("shifts {:?}", shifts);
        check_log_period(self.par.log_period);

        let s = m.subset();
        let a = NormalOp::<L, _>::new(m, 0.);
        let b = b.sub(s);
        let n = a.size();
        let deadline = Deadline::new(self.par.max_duration);

        let norm2_b = L::norm2(b);

        // x = 0, r = b, p = b
        let mut r = vec![Complex::zero(); n];
        let mut p = vec![Complex::zero(); n];
        let mut q = vec![Complex::zero(); n];
        L::copy(b, &mut r);
        L::copy(b, &mut p);
        let mut rho = norm2_b;

        if !rho.is_finite() {
            log::warn!("----- Breakdown: |b|^2 {:.3e}", rho);

            return Err(SolverError::Breakdown {iter: 0});
        }

        let mut states: Vec<ShiftState<'_, L::F>> = shifts.iter().zip(rsd_targets).zip(xs.iter_mut())
            .map(|((&sigma, &rsd_target), x)| {
                let x = x.sub_mut(s);
                L::zero(x);
                let rsd_sq = rsd_sq(rsd_target, norm2_b);
                ShiftState {
                    sigma,
                    rsd_sq,
                    zeta: 1.,
                    zeta_prev: 1.,
                    p: b.to_vec(),
                    x,
                    retired: if rho == 0. || reached(rho, rsd_sq) {Some(0)} else {None},
                    stalled: false,
                    norm2_r: rho,
                }
            })
            .collect();

        let mut c = Coef {
            alpha: 0.,
            alpha_prev: 1.,
            beta: 0.,
            beta_prev: 0.,
        };
        let mut n_count = 0;

        log::info!("----- Started");
        while states.iter().any(|st| st.active()) {
            if n_count >= self.par.max_iter {
                break;
            }
            if deadline.expired() {
                let resid = rel_from_sq(rho, norm2_b);
                log::warn!("----- Timeout: {:?}, {} iterations, residual {:.3e}", deadline.elapsed(), n_count, resid);

                return Err(SolverError::Timeout {iter: n_count, resid});
            }

            // unshifted recursion
            a.op(Dir::Forward, &p, &mut q);

            let p_q = L::inner_re(&p, &q);
            if !(p_q > 0.) || !p_q.is_finite() {
                log::warn!("----- Breakdown: <p, Ap> = {:.3e} at {}", p_q, n_count);

                return Err(SolverError::Breakdown {iter: n_count});
            }

            c.alpha = rho / p_q;
            L::add(-c.alpha, &q, &mut r);

            let rho_next = L::norm2(&r);
            if !rho_next.is_finite() {
                log::warn!("----- Breakdown: residual {:.3e} at {}", rho_next, n_count + 1);

                return Err(SolverError::Breakdown {iter: n_count + 1});
            }
            c.beta = rho_next / rho;
            L::xpay(&r, c.beta, &mut p);
            n_count += 1;

            // per-shift updates, independent of each other
            #[cfg(feature = "rayon")]
            {
                use rayon::prelude::*;

                states.par_iter_mut()
                    .filter(|st| st.active())
                    .for_each(|st| st.step::<L>(&c, &r, rho_next, n_count));
            }
            #[cfg(not(feature = "rayon"))]
            {
                states.iter_mut()
                    .filter(|st| st.active())
                    .for_each(|st| st.step::<L>(&c, &r, rho_next, n_count));
            }

            if states.iter().any(|st| !st.zeta.is_finite()) {
                log::warn!("----- Breakdown: shift recursion not finite at {}", n_count);

                return Err(SolverError::Breakdown {iter: n_count});
            }

            let n_active = states.iter().filter(|st| st.active()).count();
            if log_trig(n_count, self.par.log_period) || n_active == 0 {
                log::debug!("{}: resid {:.3e}, {} shifts active", n_count, rel_from_sq(rho_next, norm2_b), n_active);
            }
            else {
                log::trace!("{}: resid {:.3e}, {} shifts active", n_count, rel_from_sq(rho_next, norm2_b), n_active);
            }

            c.alpha_prev = c.alpha;
            c.beta_prev = c.beta;
            rho = rho_next;

            if exhausted(rho) {
                log::debug!("{}: unshifted recursion exhausted", n_count);
                break;
            }
        }

        let mut rslts = Vec::with_capacity(states.len());
        for (i, st) in states.iter().enumerate() {
            let converged = st.retired.is_some();

            let resid = if self.par.check_resid {
                let a_s = NormalOp::<L, _>::new(m, st.sigma);
                rel_resid::<L, _>(&a_s, b, &st.x[..])
            }
            else {
                rel_from_sq(st.norm2_r, norm2_b)
            };

            if !converged {
                log::warn!("----- ConvergenceFailure: shift #{} ({:.3e}) {} iterations, residual {:.3e}", i, st.sigma, n_count, resid);

                if !self.par.allow_partial {
                    return Err(SolverError::ConvergenceFailure {shift: Some(i), iter: n_count, resid});
                }
            }

            rslts.push(SystemSolverResult {
                n_count: st.retired.unwrap_or(n_count),
                converged,
                resid,
            });
        }

        log::info!("----- Converged: {} iterations, {}/{} shifts", n_count, rslts.iter().filter(|r| r.converged).count(), rslts.len());
        for (i, rslt) in rslts.iter().enumerate() {
            log::debug!("shift #{}: {:?}", i, rslt);
        }

        Ok(rslts)
    }
}

impl<L: LinAlg> Default for MultiShiftCgSolver<L>
{
    fn default() -> Self
    {
        Self::new()
    }
}

//

#[test]
fn test_mscg_diag()
{
    use float_eq::assert_float_eq;
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Full, |c| Complex::new(1. + c[0] as f64 + 2. * c[1] as f64, 0.5 * c[2] as f64));
    let b = Field::from_fn(&lat, |c| Complex::new(1. + c[3] as f64, -1.));

    let shifts = [0., 0.1, 2.5];
    let tols = [1e-10; 3];
    let mut xs = vec![Field::from_fn(&lat, |_| Complex::new(9., 9.)); 3];

    let s = MultiShiftCgSolver::<L>::new();
    let rslts = s.solve(&m, &b, &shifts, &tols, &mut xs).unwrap();
    assert_eq!(rslts.len(), 3);

    for ((sigma, x), rslt) in shifts.iter().zip(&xs).zip(&rslts) {
        assert!(rslt.converged);
        assert!(rslt.resid <= 2e-10);

        for ((d, u), v) in m.diag().iter().zip(x.sub(Subset::Full)).zip(b.sub(Subset::Full)) {
            let expect = *v / (d.norm_sqr() + sigma);
            assert_float_eq!(u.re, expect.re, abs <= 1e-8);
            assert_float_eq!(u.im, expect.im, abs <= 1e-8);
        }
    }
    // larger shifts are better conditioned
    assert!(rslts[2].n_count <= rslts[0].n_count);
}

#[test]
fn test_mscg_partial()
{
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    // spread spectrum so that the unshifted system is slow
    let lat = Lattice::shared(&[4, 4, 4, 4]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Full, |c| {
        Complex::new(1. + 0.1 * (c[0] + 4 * c[1] + 16 * c[2] + 64 * c[3]) as f64, 0.)
    });
    let mut b = Field::zeros(&lat);
    b.fill(Subset::Full, Complex::new(1., 0.));

    let shifts = [0., 1e4];
    let tols = [1e-6; 2];
    let mut xs = vec![Field::zeros(&lat); 2];

    let s = MultiShiftCgSolver::<L>::new().par(|p| {p.max_iter = 20});
    let rslt = s.solve(&m, &b, &shifts, &tols, &mut xs);
    assert!(matches!(rslt, Err(SolverError::ConvergenceFailure {shift: Some(0), iter: 20, ..})));

    let s = s.par(|p| {p.allow_partial = true});
    let rslts = s.solve(&m, &b, &shifts, &tols, &mut xs).unwrap();
    assert!(!rslts[0].converged);
    assert_eq!(rslts[0].n_count, 20);
    assert!(rslts[1].converged);
    assert!(rslts[1].n_count < 20);
    assert!(rslts[1].resid <= 2e-6);
}

#[test]
fn test_mscg_failure()
{
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Even, |c| Complex::new(1. + c[0] as f64, 0.));
    let b = Field::from_fn(&lat, |_| Complex::new(1., 0.));
    let mut xs = vec![Field::zeros(&lat); 2];

    let s = MultiShiftCgSolver::<L>::new();
    assert_eq!(s.solve(&m, &b, &[0., 1.], &[1e-8], &mut xs), Err(SolverError::DimensionMismatch));

    let s = s.par(|p| {p.max_iter = 0});
    let rslt = s.solve(&m, &b, &[0., 1.], &[1e-8, 1e-8], &mut xs);
    assert_eq!(rslt, Err(SolverError::ConvergenceFailure {shift: Some(0), iter: 0, resid: 1.}));

    // zero source converges at once
    let zero = Field::zeros(&lat);
    let rslts = s.solve(&m, &zero, &[0., 1.], &[1e-8, 1e-8], &mut xs).unwrap();
    assert!(rslts.iter().all(|r| r.converged && r.n_count == 0));
    assert!(xs.iter().all(|x| x.sub(Subset::Even).iter().all(|u| u.is_zero())));

    // tolerance 0 is never met, however long it runs
    let s = s.par(|p| {p.max_iter = 5000});
    let rslt = s.solve(&m, &b, &[0., 1.], &[1e-8, 0.], &mut xs);
    assert!(matches!(rslt, Err(SolverError::ConvergenceFailure {shift: Some(1), ..})));

    let s = s.par(|p| {p.allow_partial = true});
    let rslts = s.solve(&m, &b, &[0., 1.], &[1e-8, 0.], &mut xs).unwrap();
    assert!(rslts[0].converged);
    assert!(!rslts[1].converged);
}

#[test]
fn test_mscg_not_finite()
{
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Full, |c| Complex::new(1. + c[0] as f64, 0.));
    let mut b = Field::from_fn(&lat, |_| Complex::new(1., 0.));
    b.sub_mut(Subset::Full)[2] = Complex::new(f64::NAN, 0.);
    let mut xs = vec![Field::zeros(&lat); 2];

    let s = MultiShiftCgSolver::<L>::new();
    assert_eq!(s.solve(&m, &b, &[0., 1.], &[1e-8, 1e-8], &mut xs), Err(SolverError::Breakdown {iter: 0}));
}

#[test]
fn test_mscg_timeout()
{
    use crate::{DiagOp, FloatGeneric, Lattice, Subset};

    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Full, |c| Complex::new(1. + c[0] as f64, 0.));
    let b = Field::from_fn(&lat, |_| Complex::new(1., 0.));
    let mut xs = vec![Field::zeros(&lat); 2];

    let s = MultiShiftCgSolver::<L>::new().par(|p| {
        p.max_duration = Some(Duration::ZERO);
        p.allow_partial = true;
    });
    let rslt = s.solve(&m, &b, &[0., 1.], &[1e-8, 1e-8], &mut xs);
    assert_eq!(rslt, Err(SolverError::Timeout {iter: 0, resid: 1.}));
}
