#![allow(dead_code)]

use std::f64::consts::PI;
use std::sync::Arc;
use num_complex::{Complex, Complex64};
use num_traits::Zero;
use rand::prelude::*;
use latkrylov::prelude::*;
use latkrylov::*;

fn cplx<F: Real>(z: Complex64) -> Complex<F>
{
    Complex::new(F::round_from(z.re), F::round_from(z.im))
}

/// Random field on the whole lattice, reproducible by `seed`.
pub fn random_field<F: Real>(lattice: &Arc<Lattice>, seed: u64) -> Field<F>
{
    let mut rng = StdRng::seed_from_u64(seed);
    Field::from_fn(lattice, |_| {
        cplx(Complex64::new(rng.gen_range(-1. .. 1.), rng.gen_range(-1. .. 1.)))
    })
}

/// Relative distance \\(\\|x - y\\| / \\|y\\|\\) on a subset.
pub fn rel_diff<F: Real>(x: &Field<F>, y: &Field<F>, s: Subset) -> f64
{
    let mut num = 0.;
    let mut den = 0.;
    for (u, v) in x.sub(s).iter().zip(y.sub(s)) {
        let d = Complex64::new((u.re - v.re).widen(), (u.im - v.im).widen());
        num += d.norm_sqr();
        den += Complex64::new(v.re.widen(), v.im.widen()).norm_sqr();
    }
    (num / den).sqrt()
}

/// Inner product \\(\langle x, y \rangle\\) on a subset, in `f64`.
pub fn inner<F: Real>(x: &[Complex<F>], y: &[Complex<F>]) -> Complex64
{
    x.iter().zip(y)
        .map(|(u, v)| Complex64::new(u.re.widen(), -u.im.widen()) * Complex64::new(v.re.widen(), v.im.widen()))
        .sum()
}

//

/// Nearest-neighbour operator with random U(1) links
///
/// \\[
/// (D x)(n) = d(n) x(n) - \sum_\mu \left( a\, U_\mu(n) x(n + \hat\mu) + b\, \bar{U}_\mu(n - \hat\mu) x(n - \hat\mu) \right)
/// \\]
/// with a complex site-diagonal \\(d\\).
/// Not Hermitian unless \\(a = b\\) and \\(d\\) is real; \\(D^\dagger\\) swaps \\(a\\) and \\(b\\).
pub struct Hopping<L: LinAlg>
{
    lattice: Arc<Lattice>,
    ee: DiagOp<L>,
    ee_inv: DiagOp<L>,
    oo: DiagOp<L>,
    links: Vec<Vec<Complex<L::F>>>,
    fw: f64,
    bw: f64,
}

impl<L: LinAlg> Hopping<L>
{
    /// Diagonal values are `mass` plus uniform noise in `[0, 1) + i [-0.5, 0.5)`.
    pub fn new(lattice: &Arc<Lattice>, mass: f64, fw: f64, bw: f64, seed: u64) -> Self
    {
        assert!(lattice.is_bipartite());

        let mut rng = StdRng::seed_from_u64(seed);

        let links = (0.. lattice.n_dims())
            .map(|_| {
                (0.. lattice.vol())
                    .map(|_| cplx(Complex64::from_polar(1., rng.gen_range(0. .. 2. * PI))))
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut diag = |_: &[usize]| {
            cplx(Complex64::new(mass + rng.gen_range(0. .. 1.), rng.gen_range(-0.5 .. 0.5)))
        };
        let ee = DiagOp::<L>::from_fn(lattice, Subset::Even, &mut diag);
        let oo = DiagOp::<L>::from_fn(lattice, Subset::Odd, &mut diag);
        let ee_inv = ee.inverse().expect("even-even block not invertible");

        Hopping {
            lattice: lattice.clone(),
            ee,
            ee_inv,
            oo,
            links,
            fw,
            bw,
        }
    }

    // from the checkerboard `src` to the other one
    fn hop(&self, dir: Dir, src: Subset, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        let lat = &self.lattice;
        let (fw, bw) = match dir {
            Dir::Forward => (self.fw, self.bw),
            Dir::Adjoint => (self.bw, self.fw),
        };
        let fw = L::F::round_from(fw);
        let bw = L::F::round_from(bw);
        let off = lat.subset_range(src).start;

        assert_eq!(x.len(), lat.subset_len(src));
        assert_eq!(y.len(), lat.subset_len(src.other()));

        for (v, idx) in y.iter_mut().zip(lat.subset_range(src.other())) {
            let lex = lat.site(idx);
            let mut acc = Complex::zero();
            for mu in 0.. lat.n_dims() {
                let up = lat.neighbor(lex, mu, true);
                let dn = lat.neighbor(lex, mu, false);
                acc = acc
                    + self.links[mu][lex] * x[lat.index(up) - off] * fw
                    + self.links[mu][dn].conj() * x[lat.index(dn) - off] * bw;
            }
            *v = -acc;
        }
    }
}

impl<L: LinAlg> EvenOddBlocks<L> for Hopping<L>
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
        self.ee_inv.apply_slice(dir, x, y);
    }

    fn even_odd(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        self.hop(dir, Subset::Odd, x, y);
    }

    fn odd_even(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        self.hop(dir, Subset::Even, x, y);
    }

    fn odd_odd(&self, dir: Dir, x: &[Complex<L::F>], y: &mut [Complex<L::F>])
    {
        self.oo.apply_slice(dir, x, y);
    }
}
