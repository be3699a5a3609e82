/*!
Even-odd preconditioned lattice operators and conjugate gradient solvers.

<script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>

This crate for Rust provides linear solvers for systems \\(D x = b\\)
of which \\(D\\) is a sparse operator on a hypercubic lattice, typically a discretized Dirac operator.

# General usage

1. Choose a [`solver::LinAlg`] implementation to use:
   * [`FloatGeneric`] -
     `f32`/`f64`-generic, serial, pure Rust.
   * `FloatParallel` (feature `rayon`) -
     same arithmetic as [`FloatGeneric`], data-parallel over sites.
1. Express your operator either
   * as a [`solver::LinOp`] on the full lattice, or
   * as [`EvenOddBlocks`] to get the reduced operator [`EvenOddPrecOp`]
     \\(A = D_{oo} - D_{oe} D_{ee}^{-1} D_{eo}\\) on the odd checkerboard.
1. Create a [`CgSolver`] or [`MultiShiftCgSolver`] instance and optionally set its parameters.
1. Invoke [`qprop_unprec`], [`qprop_eo`], [`CgSolver::solve`] or [`MultiShiftCgSolver::solve`].

# Examples

```
use num_complex::Complex;
use latkrylov::prelude::*;
use latkrylov::*;

//env_logger::init(); // Use any logger crate as `latkrylov` uses `log` crate.

type La = FloatGeneric<f64>;

let lat = Lattice::shared(&[4, 4, 4, 4]);
let d = DiagOp::<La>::from_fn(&lat, Subset::Full, |c| Complex::new(1. + c[0] as f64, 0.5));
let b = Field::from_fn(&lat, |c| Complex::new(1., c[1] as f64));
let mut x = Field::zeros(&lat);

let s = CgSolver::<La>::new().par(|p| {
    p.rsd_target = 1e-10;
});
let rslt = qprop_unprec(&s, &d, &b, &mut x).unwrap();
println!("{:?}", rslt);

assert!(rslt.converged);
assert!(rel_resid::<La, _>(&d, b.sub(Subset::Full), x.sub(Subset::Full)) < 1e-9);
```
*/

pub mod solver;

//

mod lattice;

pub use lattice::*;

//

mod floatgeneric;

pub use floatgeneric::*;

#[cfg(feature = "rayon")]
mod floatparallel;

#[cfg(feature = "rayon")]
pub use floatparallel::*;

//

mod diagop;
mod normalop;
mod eoprec;

pub use diagop::*;
pub use normalop::*;
pub use eoprec::*;

//

mod residual;
mod inv_cg;
mod inv_mscg;
mod qprop;

pub use residual::rel_resid;
pub use inv_cg::*;
pub use inv_mscg::*;
pub use qprop::*;

//

/// Prelude
pub mod prelude
{
    pub use super::solver::{Dir, LinAlg, LinOp, Real, SolverError, SystemSolverResult};
    pub use super::FloatGeneric;

    #[cfg(feature = "rayon")]
    pub use super::FloatParallel;
}
