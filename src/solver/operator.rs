//! Linear operator

use num_complex::Complex;
use crate::lattice::{Lattice, Subset};
use crate::solver::LinAlg;

/// Direction of an operator application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dir
{
    /// Apply \\(M\\).
    Forward,
    /// Apply \\(M^\dagger\\).
    Adjoint,
}

impl Dir
{
    /// The opposite direction.
    pub fn flip(self) -> Self
    {
        match self {
            Dir::Forward => Dir::Adjoint,
            Dir::Adjoint => Dir::Forward,
        }
    }
}

//

/// Linear operator trait
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Expresses a linear operator \\(M\\) acting on lattice fields restricted to a working subset,
/// such as a discretized Dirac operator or its even-odd reduced form.
/// Solvers only borrow an operator for the duration of a solve,
/// and application shall not change anything visible to the caller.
pub trait LinOp<L: LinAlg>
{
    /// Lattice on which the operator acts.
    fn lattice(&self) -> &Lattice;

    /// Working subset of the operator.
    ///
    /// Both input and output vectors of [`LinOp::op`] are restricted to this subset.
    fn subset(&self) -> Subset;

    /// Calculate \\(y = M x\\) or \\(y = M^\dagger x\\).
    ///
    /// * `dir` selects \\(M\\) ([`Dir::Forward`]) or \\(M^\dagger\\) ([`Dir::Adjoint`]).
    /// * `x` is a vector \\(x\\).
    /// * `y` is a vector of which contents before entry are ignored, \\(M x\\) or \\(M^\dagger x\\) on exit.
    ///
    /// The lengths of `x` and `y` shall be `self.lattice().subset_len(self.subset())`.
    fn op(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>]);

    /// Length of vectors that [`LinOp::op`] takes.
    fn size(&self) -> usize
    {
        self.lattice().subset_len(self.subset())
    }
}

impl<L: LinAlg, O: LinOp<L> + ?Sized> LinOp<L> for &O
{
    fn lattice(&self) -> &Lattice
    {
        (**self).lattice()
    }

    fn subset(&self) -> Subset
    {
        (**self).subset()
    }

    fn op(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        (**self).op(dir, x, y)
    }
}
