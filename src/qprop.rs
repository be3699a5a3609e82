//! Propagator drivers
//!
//! <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
//! <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
//!
//! Solve \\(D x = b\\) on the full lattice with [`CgSolver`].

use crate::eoprec::{EvenOddBlocks, EvenOddPrecOp};
use crate::inv_cg::CgSolver;
use crate::lattice::{Field, Subset};
use crate::residual::{check_lattice, rel_resid};
use crate::solver::{Dir, LinAlg, LinOp, SolverError, SystemSolverResult};

/// Solves \\(D x = b\\) through the normal equations \\(D^\dagger D x = D^\dagger b\\).
///
/// Returns `Ok` with [`SystemSolverResult`] of the normal equations,
/// or `Err` with [`SolverError`] type.
/// * `cg` is a [`CgSolver`] of which tolerance applies to the normal equations.
/// * `d` is \\(D\\) on its working subset, usually [`Subset::Full`].
/// * `b` is \\(b\\).
/// * `x` is an initial guess before entry, the solution on exit.
pub fn qprop_unprec<L, O>(cg: &CgSolver<L>, d: &O, b: &Field<L::F>, x: &mut Field<L::F>)
-> Result<SystemSolverResult, SolverError>
where L: LinAlg, O: LinOp<L>
{
    check_lattice(d.lattice(), b, "b")?;
    check_lattice(d.lattice(), x, "x")?;

    let s = d.subset();
    let mut c = Field::zeros(b.lattice());
    d.op(Dir::Adjoint, b.sub(s), c.sub_mut(s));

    let rslt = cg.solve(d, &c, x)?;

    if log::log_enabled!(log::Level::Debug) {
        log::debug!("qprop_unprec: |b - D x| / |b| = {:.3e}", rel_resid::<L, _>(d, b.sub(s), x.sub(s)));
    }

    Ok(rslt)
}

/// Solves \\(D x = b\\) by even-odd preconditioning.
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Reduces to \\(A x_o = b'_o\\) ([`EvenOddPrecOp::prepare_source`]),
/// solves \\(A^\dagger A x_o = A^\dagger b'_o\\) with `cg`,
/// then reconstructs \\(x_e\\) ([`EvenOddPrecOp::reconstruct`]).
///
/// Returns `Ok` with [`SystemSolverResult`] of the reduced normal equations,
/// or `Err` with [`SolverError`] type.
/// * `cg` is a [`CgSolver`] of which tolerance applies to the reduced normal equations.
/// * `eo` is the even-odd preconditioned \\(D\\).
/// * `b` is \\(b\\).
/// * `x` is the solution on exit. Its odd checkerboard before entry is the initial guess of \\(x_o\\).
pub fn qprop_eo<L, B>(cg: &CgSolver<L>, eo: &EvenOddPrecOp<L, B>, b: &Field<L::F>, x: &mut Field<L::F>)
-> Result<SystemSolverResult, SolverError>
where L: LinAlg, B: EvenOddBlocks<L>
{
    check_lattice(eo.lattice(), b, "b")?;
    check_lattice(eo.lattice(), x, "x")?;

    let mut b_prime = Field::zeros(b.lattice());
    eo.prepare_source(b, &mut b_prime)?;

    let mut c = Field::zeros(b.lattice());
    eo.op(Dir::Adjoint, b_prime.sub(Subset::Odd), c.sub_mut(Subset::Odd));

    let rslt = cg.solve(eo, &c, x)?;

    eo.reconstruct(b, x)?;

    if log::log_enabled!(log::Level::Debug) {
        let d = eo.unprec();
        log::debug!("qprop_eo: |b - D x| / |b| = {:.3e}", rel_resid::<L, _>(&d, b.sub(Subset::Full), x.sub(Subset::Full)));
    }

    Ok(rslt)
}
