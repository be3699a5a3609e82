//! Normal equations operator

use core::marker::PhantomData;
use num_complex::Complex;
use num_traits::Zero;
use crate::lattice::{Lattice, Subset};
use crate::solver::{Dir, LinAlg, LinOp};

//

/// Shifted normal operator
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\(M^\dagger M + \sigma I\\) as a Hermitian [`LinOp`] on the working subset of \\(M\\).
/// Both directions apply the same operator.
pub struct NormalOp<L: LinAlg, O: LinOp<L>>
{
    ph_l: PhantomData<L>,
    m: O,
    shift: f64,
}

impl<L: LinAlg, O: LinOp<L>> NormalOp<L, O>
{
    /// Creates an instance.
    ///
    /// Returns [`NormalOp`] instance.
    /// * `m` is \\(M\\). Pass a reference to keep using the operator afterward.
    /// * `shift` is \\(\sigma\\).
    pub fn new(m: O, shift: f64) -> Self
    {
        NormalOp {
            ph_l: PhantomData,
            m,
            shift,
        }
    }

    /// Shift \\(\sigma\\).
    pub fn shift(&self) -> f64
    {
        self.shift
    }
}

impl<L: LinAlg, O: LinOp<L>> LinOp<L> for NormalOp<L, O>
{
    fn lattice(&self) -> &Lattice
    {
        self.m.lattice()
    }

    fn subset(&self) -> Subset
    {
        self.m.subset()
    }

    fn op(&self, _dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        let mut tmp = vec![Complex::zero(); self.m.size()];

        self.m.op(Dir::Forward, x, &mut tmp);
        self.m.op(Dir::Adjoint, &tmp, y);

        if self.shift != 0. {
            L::add(self.shift, x, y);
        }
    }
}

//

#[test]
fn test_normalop1()
{
    use float_eq::assert_float_eq;
    use crate::{DiagOp, FloatGeneric};

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Full, |c| Complex::new(c[0] as f64, 1. + c[3] as f64));
    let x = vec![Complex::new(1., -1.); 16];
    let mut y = vec![Complex::zero(); 16];

    let a = NormalOp::<L, _>::new(&m, 0.5);
    assert_eq!(a.size(), 16);
    assert_eq!(a.shift(), 0.5);

    a.op(Dir::Forward, &x, &mut y);
    for ((d, u), v) in m.diag().iter().zip(&x).zip(&y) {
        let expect = *u * (d.norm_sqr() + 0.5);
        assert_float_eq!(v.re, expect.re, abs <= 1e-14);
        assert_float_eq!(v.im, expect.im, abs <= 1e-14);
    }
}
