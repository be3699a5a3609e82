//! Even-odd (Schur complement) preconditioning

use core::marker::PhantomData;
use num_complex::Complex;
use num_traits::{Float, Zero};
use crate::lattice::{Field, Lattice, Subset};
use crate::residual::check_lattice;
use crate::solver::{Dir, LinAlg, LinOp, Real, SolverError};

/// Checkerboard blocks of a lattice operator
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Expresses an operator \\(D\\) on the full lattice as
/// \\[
/// D = \begin{pmatrix} D_{ee} & D_{eo} \\\\ D_{oe} & D_{oo} \end{pmatrix}
/// \\]
/// where \\(D_{ee}\\) shall be cheaply and exactly invertible,
/// typically site-diagonal or block-diagonal.
///
/// Every block reads one checkerboard and writes one checkerboard,
/// both as slices in the order of [`Field::sub`].
/// The contents of output slices before entry are ignored.
/// [`Dir::Adjoint`] selects the block of \\(D^\dagger\\):
/// for example `even_odd(Dir::Adjoint, ..)` applies \\((D^\dagger)_{eo} = (D_{oe})^\dagger\\).
pub trait EvenOddBlocks<L: LinAlg>
{
    /// Lattice on which \\(D\\) acts.
    fn lattice(&self) -> &Lattice;

    /// Calculate \\(y_e = D_{ee} x_e\\).
    fn even_even(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>]);

    /// Calculate \\(y_e = D_{ee}^{-1} x_e\\) exactly, without iteration.
    fn even_even_inv(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>]);

    /// Calculate \\(y_e = D_{eo} x_o\\).
    fn even_odd(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>]);

    /// Calculate \\(y_o = D_{oe} x_e\\).
    fn odd_even(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>]);

    /// Calculate \\(y_o = D_{oo} x_o\\).
    fn odd_odd(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>]);

    /// Whether [`EvenOddBlocks::even_even_inv`] is an exact inverse.
    ///
    /// A discretization whose even-even block is not block-diagonal shall return `false`,
    /// and then [`EvenOddPrecOp::new`] refuses it.
    fn has_exact_ee_inv(&self) -> bool
    {
        true
    }
}

impl<L: LinAlg, B: EvenOddBlocks<L> + ?Sized> EvenOddBlocks<L> for &B
{
    fn lattice(&self) -> &Lattice
    {
        (**self).lattice()
    }

    fn even_even(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        (**self).even_even(dir, x, y)
    }

    fn even_even_inv(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        (**self).even_even_inv(dir, x, y)
    }

    fn even_odd(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        (**self).even_odd(dir, x, y)
    }

    fn odd_even(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        (**self).odd_even(dir, x, y)
    }

    fn odd_odd(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        (**self).odd_odd(dir, x, y)
    }

    fn has_exact_ee_inv(&self) -> bool
    {
        (**self).has_exact_ee_inv()
    }
}

//

fn cb_check<F>(lattice: &Lattice, cb: Subset, v: &[F], what: &str)
{
    debug_assert_eq!(v.len(), lattice.subset_len(cb), "checkerboard mismatch: {} is not {:?}", what, cb);
}

//

/// Even-odd preconditioned operator
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Schur complement of \\(D\\) on the odd checkerboard,
/// \\(A = D_{oo} - D_{oe} D_{ee}^{-1} D_{eo}\\),
/// as a [`LinOp`] of which working subset is [`Subset::Odd`].
/// Solving \\(D x = b\\) reduces to \\(A x_o = b_o - D_{oe} D_{ee}^{-1} b_e\\)
/// ([`EvenOddPrecOp::prepare_source`])
/// followed by \\(x_e = D_{ee}^{-1} (b_e - D_{eo} x_o)\\) ([`EvenOddPrecOp::reconstruct`]).
pub struct EvenOddPrecOp<L: LinAlg, B: EvenOddBlocks<L>>
{
    ph_l: PhantomData<L>,
    blocks: B,
}

impl<L: LinAlg, B: EvenOddBlocks<L>> EvenOddPrecOp<L, B>
{
    /// Creates an instance.
    ///
    /// Returns [`EvenOddPrecOp`] instance,
    /// or `Err` with [`SolverError::PreconditioningInapplicable`]
    /// if the even-even block does not have an exact inverse.
    /// * `blocks` is \\(D\\) given by [`EvenOddBlocks`].
    ///   Pass a reference to keep using the blocks afterward.
    pub fn new(blocks: B) -> Result<Self, SolverError>
    {
        let n_e = blocks.lattice().subset_len(Subset::Even);

        if !blocks.has_exact_ee_inv() {
            log::error!("Even-even block declares no exact inverse");
            return Err(SolverError::PreconditioningInapplicable);
        }

        for dir in [Dir::Forward, Dir::Adjoint] {
            let err = Self::ee_inv_error(&blocks, dir, n_e);
            let tol = L::F::epsilon().widen().sqrt();
            log::debug!("even-even inverse check {:?}: {:.2e}", dir, err);

            if !(err <= tol) {
                log::error!("Even-even inverse check {:?}: error {:.2e} > {:.2e}", dir, err, tol);
                return Err(SolverError::PreconditioningInapplicable);
            }
        }

        Ok(EvenOddPrecOp {
            ph_l: PhantomData,
            blocks,
        })
    }

    // relative error of ee_inv(ee(v)) against a deterministic trial v
    fn ee_inv_error(blocks: &B, dir: Dir, n_e: usize) -> f64
    {
        let trial: Vec<Complex<L::F>> = (0.. n_e)
            .map(|i| {
                let re = 1. + (i % 7) as f64 * 0.125;
                let im = ((i * 3) % 5) as f64 * 0.25 - 0.5;
                Complex::new(L::F::round_from(re), L::F::round_from(im))
            })
            .collect();
        let mut y = vec![Complex::zero(); n_e];
        let mut z = vec![Complex::zero(); n_e];

        blocks.even_even(dir, &trial, &mut y);
        blocks.even_even_inv(dir, &y, &mut z);
        L::add(-1., &trial, &mut z);

        let norm_p = L::norm(&trial);
        if norm_p > 0. {
            L::norm(&z) / norm_p
        }
        else {
            0.
        }
    }

    /// Blocks of \\(D\\).
    pub fn blocks(&self) -> &B
    {
        &self.blocks
    }

    fn scratch(&self, cb: Subset) -> Vec<Complex<L::F>>
    {
        vec![Complex::zero(); self.blocks.lattice().subset_len(cb)]
    }

    /// Calculates the right-hand side of the reduced system,
    /// \\(b'_o = b_o - D_{oe} D_{ee}^{-1} b_e\\).
    ///
    /// Returns `Err` with [`SolverError::DimensionMismatch`] if a field lives on another lattice.
    /// * `b` is \\(b\\) on the full lattice.
    /// * `b_prime` receives \\(b'_o\\) on its odd checkerboard. Its even checkerboard is left untouched.
    pub fn prepare_source(&self, b: &Field<L::F>, b_prime: &mut Field<L::F>) -> Result<(), SolverError>
    {
        let lat = self.blocks.lattice();
        check_lattice(lat, b, "b")?;
        check_lattice(lat, b_prime, "b_prime")?;

        let mut t_e = self.scratch(Subset::Even);
        let mut t_o = self.scratch(Subset::Odd);
        let (b_e, b_o) = b.split_cb();

        self.blocks.even_even_inv(Dir::Forward, b_e, &mut t_e);
        self.blocks.odd_even(Dir::Forward, &t_e, &mut t_o);

        let bp_o = b_prime.sub_mut(Subset::Odd);
        L::copy(b_o, bp_o);
        L::add(-1., &t_o, bp_o);

        Ok(())
    }

    /// Reconstructs the even checkerboard of the solution,
    /// \\(x_e = D_{ee}^{-1} (b_e - D_{eo} x_o)\\).
    ///
    /// Returns `Err` with [`SolverError::DimensionMismatch`] if a field lives on another lattice.
    /// * `b` is \\(b\\) on the full lattice.
    /// * `x` is the solution whose odd checkerboard \\(x_o\\) is given,
    ///   and whose even checkerboard receives \\(x_e\\).
    pub fn reconstruct(&self, b: &Field<L::F>, x: &mut Field<L::F>) -> Result<(), SolverError>
    {
        let lat = self.blocks.lattice();
        check_lattice(lat, b, "b")?;
        check_lattice(lat, x, "x")?;

        let mut t_e = self.scratch(Subset::Even);
        let (b_e, _) = b.split_cb();
        let (x_e, x_o) = x.split_cb_mut();

        self.blocks.even_odd(Dir::Forward, x_o, &mut t_e);
        L::xpay(b_e, -1., &mut t_e);
        self.blocks.even_even_inv(Dir::Forward, &t_e, x_e);

        Ok(())
    }

    /// View of the unpreconditioned \\(D\\) assembled from its blocks,
    /// as a [`LinOp`] on [`Subset::Full`].
    pub fn unprec(&self) -> EvenOddUnprecOp<'_, L, B>
    {
        EvenOddUnprecOp {
            eo: self,
        }
    }
}

impl<L: LinAlg, B: EvenOddBlocks<L>> LinOp<L> for EvenOddPrecOp<L, B>
{
    fn lattice(&self) -> &Lattice
    {
        self.blocks.lattice()
    }

    fn subset(&self) -> Subset
    {
        Subset::Odd
    }

    fn op(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        let lat = self.blocks.lattice();
        cb_check(lat, Subset::Odd, x, "x");
        cb_check(lat, Subset::Odd, y, "y");

        let mut t_e1 = self.scratch(Subset::Even);
        let mut t_e2 = self.scratch(Subset::Even);
        let mut t_o = self.scratch(Subset::Odd);

        // odd -> even, even -> even, even -> odd
        self.blocks.even_odd(dir, x, &mut t_e1);
        self.blocks.even_even_inv(dir, &t_e1, &mut t_e2);
        self.blocks.odd_even(dir, &t_e2, &mut t_o);

        self.blocks.odd_odd(dir, x, y);
        L::add(-1., &t_o, y);
    }
}

//

/// Unpreconditioned operator assembled from [`EvenOddBlocks`]
///
/// \\(y_e = D_{ee} x_e + D_{eo} x_o,\ y_o = D_{oe} x_e + D_{oo} x_o\\) on [`Subset::Full`].
/// Created by [`EvenOddPrecOp::unprec`].
pub struct EvenOddUnprecOp<'a, L: LinAlg, B: EvenOddBlocks<L>>
{
    eo: &'a EvenOddPrecOp<L, B>,
}

impl<'a, L: LinAlg, B: EvenOddBlocks<L>> LinOp<L> for EvenOddUnprecOp<'a, L, B>
{
    fn lattice(&self) -> &Lattice
    {
        self.eo.blocks.lattice()
    }

    fn subset(&self) -> Subset
    {
        Subset::Full
    }

    fn op(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        let blocks = &self.eo.blocks;
        let n_e = blocks.lattice().subset_len(Subset::Even);
        assert_eq!(x.len(), blocks.lattice().vol());
        assert_eq!(y.len(), blocks.lattice().vol());

        let mut t_e = self.eo.scratch(Subset::Even);
        let mut t_o = self.eo.scratch(Subset::Odd);
        let (x_e, x_o) = x.split_at(n_e);
        let (y_e, y_o) = y.split_at_mut(n_e);

        blocks.even_even(dir, x_e, y_e);
        blocks.even_odd(dir, x_o, &mut t_e);
        L::add(1., &t_e, y_e);

        blocks.odd_odd(dir, x_o, y_o);
        blocks.odd_even(dir, x_e, &mut t_o);
        L::add(1., &t_o, y_o);
    }
}

//

#[cfg(test)]
struct DiagBlocks<L: LinAlg>
{
    lattice: std::sync::Arc<Lattice>,
    ee: crate::DiagOp<L>,
    oo: crate::DiagOp<L>,
    hop: Complex<L::F>,
}

// D_eo and D_oe couple the i-th even site to the i-th odd site with a constant weight
#[cfg(test)]
impl<L: LinAlg> EvenOddBlocks<L> for DiagBlocks<L>
{
    fn lattice(&self) -> &Lattice
    {
        &self.lattice
    }

    fn even_even(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        self.ee.apply_slice(dir, x, y);
    }

    fn even_even_inv(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        match self.ee.inverse() {
            Some(inv) => inv.apply_slice(dir, x, y),
            None => L::zero(y),
        }
    }

    fn even_odd(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        let h = if dir == Dir::Forward {self.hop} else {self.hop.conj()};
        for (v, u) in y.iter_mut().zip(x) {
            *v = h * *u;
        }
    }

    fn odd_even(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        self.even_odd(dir, x, y);
    }

    fn odd_odd(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        self.oo.apply_slice(dir, x, y);
    }
}

#[test]
fn test_eoprec_schur()
{
    use float_eq::assert_float_eq;
    use crate::{DiagOp, FloatGeneric};

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let blocks = DiagBlocks::<L> {
        lattice: lat.clone(),
        ee: DiagOp::from_fn(&lat, Subset::Even, |c| Complex::new(2. + c[0] as f64, 0.5)),
        oo: DiagOp::from_fn(&lat, Subset::Odd, |c| Complex::new(3., c[1] as f64)),
        hop: Complex::new(0.25, -0.5),
    };
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    assert_eq!(eo.subset(), Subset::Odd);
    assert_eq!(eo.size(), 8);

    // pairwise 2x2 blocks give A_i = oo_i - h ee_i^-1 h elementwise
    let x = vec![Complex::new(1., 0.5); 8];
    for dir in [Dir::Forward, Dir::Adjoint] {
        let mut y = vec![Complex::zero(); 8];
        eo.op(dir, &x, &mut y);
        for i in 0.. 8 {
            let (ee, oo, h) = match dir {
                Dir::Forward => (blocks.ee.diag()[i], blocks.oo.diag()[i], blocks.hop),
                Dir::Adjoint => (blocks.ee.diag()[i].conj(), blocks.oo.diag()[i].conj(), blocks.hop.conj()),
            };
            let expect = (oo - h * h / ee) * x[i];
            assert_float_eq!(y[i].re, expect.re, abs <= 1e-14);
            assert_float_eq!(y[i].im, expect.im, abs <= 1e-14);
        }
    }
}

#[test]
fn test_eoprec_reconstruct()
{
    use float_eq::assert_float_eq;
    use crate::{DiagOp, FloatGeneric};

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let blocks = DiagBlocks::<L> {
        lattice: lat.clone(),
        ee: DiagOp::from_fn(&lat, Subset::Even, |c| Complex::new(4., c[2] as f64)),
        oo: DiagOp::from_fn(&lat, Subset::Odd, |c| Complex::new(2. + c[3] as f64, -1.)),
        hop: Complex::new(-1., 0.25),
    };
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();

    let x_true = Field::<f64>::from_fn(&lat, |c| Complex::new(c[0] as f64 - 0.5, c[1] as f64 + c[3] as f64));
    let mut b = Field::zeros(&lat);
    eo.unprec().op(Dir::Forward, x_true.sub(Subset::Full), b.sub_mut(Subset::Full));

    // A x_o = b'_o holds for the true solution
    let mut b_prime = Field::zeros(&lat);
    eo.prepare_source(&b, &mut b_prime).unwrap();
    let mut ax = vec![Complex::zero(); 8];
    eo.op(Dir::Forward, x_true.sub(Subset::Odd), &mut ax);
    for (u, v) in ax.iter().zip(b_prime.sub(Subset::Odd)) {
        assert_float_eq!(u.re, v.re, abs <= 1e-13);
        assert_float_eq!(u.im, v.im, abs <= 1e-13);
    }

    // x_e follows from x_o
    let mut x = Field::zeros(&lat);
    x.sub_mut(Subset::Odd).copy_from_slice(x_true.sub(Subset::Odd));
    eo.reconstruct(&b, &mut x).unwrap();
    for (u, v) in x.sub(Subset::Even).iter().zip(x_true.sub(Subset::Even)) {
        assert_float_eq!(u.re, v.re, abs <= 1e-13);
        assert_float_eq!(u.im, v.im, abs <= 1e-13);
    }

    let other = Lattice::shared(&[4, 2, 2, 2]);
    assert_eq!(eo.reconstruct(&Field::zeros(&other), &mut x), Err(SolverError::DimensionMismatch));
}

#[test]
fn test_eoprec_inapplicable()
{
    use crate::{DiagOp, FloatGeneric};

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let mut ee_diag = vec![Complex::new(1., 0.); 8];
    ee_diag[3] = Complex::zero();
    let blocks = DiagBlocks::<L> {
        lattice: lat.clone(),
        ee: DiagOp::new(&lat, Subset::Even, ee_diag),
        oo: DiagOp::identity(&lat, Subset::Odd),
        hop: Complex::new(1., 0.),
    };

    assert_eq!(EvenOddPrecOp::<L, _>::new(&blocks).err(), Some(SolverError::PreconditioningInapplicable));
}
