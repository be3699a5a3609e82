//! Site-diagonal operators

use std::sync::Arc;
use num_complex::Complex;
use num_traits::{Float, One, Zero};
use crate::lattice::{Lattice, Subset};
use crate::solver::{Dir, LinAlg, LinOp};

//

/// Site-diagonal operator
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\((M x)_i = d_i x_i\\) on a subset, \\((M^\dagger x)_i = \bar{d}_i x_i\\).
/// Diagonal values are stored in the same order as [`crate::Field::sub`] of the subset.
#[derive(Clone)]
pub struct DiagOp<L: LinAlg>
{
    lattice: Arc<Lattice>,
    subset: Subset,
    diag: Vec<Complex<L::F>>,
}

impl<L: LinAlg> DiagOp<L>
{
    /// Creates an instance.
    ///
    /// Returns [`DiagOp`] instance.
    /// * `lattice` and `subset` decide the working subset.
    /// * `diag` are the diagonal values \\(d_i\\).
    ///   Its length shall be the size of the subset.
    pub fn new(lattice: &Arc<Lattice>, subset: Subset, diag: Vec<Complex<L::F>>) -> Self
    {
        assert_eq!(diag.len(), lattice.subset_len(subset));

        DiagOp {
            lattice: lattice.clone(),
            subset,
            diag,
        }
    }

    /// Creates an instance with \\(d_i\\) given by `g` called with the site coordinates.
    pub fn from_fn<G>(lattice: &Arc<Lattice>, subset: Subset, mut g: G) -> Self
    where G: FnMut(&[usize]) -> Complex<L::F>
    {
        let diag = lattice.subset_range(subset)
            .map(|idx| g(lattice.coords(lattice.site(idx)).as_slice()))
            .collect();

        Self::new(lattice, subset, diag)
    }

    /// Creates the identity on a subset.
    pub fn identity(lattice: &Arc<Lattice>, subset: Subset) -> Self
    {
        Self::new(lattice, subset, vec![Complex::one(); lattice.subset_len(subset)])
    }

    /// Diagonal values.
    pub fn diag(&self) -> &[Complex<L::F>]
    {
        &self.diag
    }

    /// Exact inverse.
    ///
    /// Returns `None` if any diagonal value is zero or the inverse is not finite.
    pub fn inverse(&self) -> Option<Self>
    {
        let mut inv = Vec::with_capacity(self.diag.len());
        for d in &self.diag {
            if d.is_zero() {
                return None;
            }
            let e = d.inv();
            if !(e.re.is_finite() && e.im.is_finite()) {
                return None;
            }
            inv.push(e);
        }

        Some(DiagOp {
            lattice: self.lattice.clone(),
            subset: self.subset,
            diag: inv,
        })
    }

    /// Calculates \\(y_i = d_i x_i\\) (or \\(\bar{d}_i x_i\\)) on slices of any checkerboard
    /// having the length of this operator.
    /// Lets a block of an even-odd operator share one diagonal between checkerboards.
    pub fn apply_slice(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        assert_eq!(x.len(), self.diag.len());
        assert_eq!(y.len(), self.diag.len());

        match dir {
            Dir::Forward => {
                for ((v, u), d) in y.iter_mut().zip(x).zip(&self.diag) {
                    *v = *d * *u;
                }
            },
            Dir::Adjoint => {
                for ((v, u), d) in y.iter_mut().zip(x).zip(&self.diag) {
                    *v = d.conj() * *u;
                }
            },
        }
    }
}

impl<L: LinAlg> LinOp<L> for DiagOp<L>
{
    fn lattice(&self) -> &Lattice
    {
        &self.lattice
    }

    fn subset(&self) -> Subset
    {
        self.subset
    }

    fn op(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        self.apply_slice(dir, x, y);
    }
}

//

#[test]
fn test_diagop1()
{
    use float_eq::assert_float_eq;
    use crate::FloatGeneric;

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let m = DiagOp::<L>::from_fn(&lat, Subset::Odd, |c| Complex::new(1. + c[0] as f64, c[1] as f64));
    assert_eq!(m.size(), 8);

    let x = vec![Complex::new(1., 1.); 8];
    let mut y = vec![Complex::zero(); 8];
    let mut z = vec![Complex::zero(); 8];

    m.op(Dir::Forward, &x, &mut y);
    m.op(Dir::Adjoint, &x, &mut z);
    for ((d, v), w) in m.diag().iter().zip(&y).zip(&z) {
        assert_eq!(*v, *d * Complex::new(1., 1.));
        assert_eq!(*w, d.conj() * Complex::new(1., 1.));
    }

    let inv = m.inverse().unwrap();
    inv.op(Dir::Forward, &y.clone(), &mut y);
    for v in &y {
        assert_float_eq!(v.re, 1., abs <= 1e-14);
        assert_float_eq!(v.im, 1., abs <= 1e-14);
    }

    let singular = DiagOp::<L>::new(&lat, Subset::Even, vec![Complex::zero(); 8]);
    assert!(singular.inverse().is_none());
    let tiny = DiagOp::<L>::new(&lat, Subset::Even, vec![Complex::new(1e-310, 0.); 8]);
    assert!(tiny.inverse().is_none());
    let tiny32 = DiagOp::<FloatGeneric<f32>>::new(&lat, Subset::Even, vec![Complex::new(1e-40, 0.); 8]);
    assert!(tiny32.inverse().is_none());
    assert!(DiagOp::<L>::identity(&lat, Subset::Full).diag().iter().all(|d| *d == Complex::new(1., 0.)));
}
