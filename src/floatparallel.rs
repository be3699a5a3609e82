use core::marker::PhantomData;
use num_complex::{Complex, Complex64};
use num_traits::Zero;
use rayon::prelude::*;
use crate::solver::{LinAlg, Real};

/// Data-parallel [`LinAlg`] implementation using `rayon`
///
/// Same arithmetic as [`crate::FloatGeneric`], split over sites on the global thread pool.
/// Reductions are combined in a tree order that depends on the split,
/// so results may differ from [`crate::FloatGeneric`] in the last bits.
#[derive(Clone)]
pub struct FloatParallel<F>
{
    ph_f: PhantomData<F>,
}

const MIN_LEN: usize = 4096;

#[inline]
fn widen<F: Real>(u: &Complex<F>) -> Complex64
{
    Complex64::new(u.re.widen(), u.im.widen())
}

impl<F: Real> LinAlg for FloatParallel<F>
{
    type F = F;

    fn norm2(x: &[Complex<F>]) -> f64
    {
        x.par_iter()
            .with_min_len(MIN_LEN)
            .map(|u| widen(u).norm_sqr())
            .sum()
    }

    fn inner(x: &[Complex<F>], y: &[Complex<F>]) -> Complex64
    {
        assert_eq!(x.len(), y.len());

        x.par_iter().zip(y.par_iter())
            .with_min_len(MIN_LEN)
            .map(|(u, v)| widen(u).conj() * widen(v))
            .reduce(Complex64::zero, |a, b| a + b)
    }

    fn copy(x: &[Complex<F>], y: &mut [Complex<F>])
    {
        assert_eq!(x.len(), y.len());

        y.par_iter_mut().zip(x.par_iter())
            .with_min_len(MIN_LEN)
            .for_each(|(v, u)| *v = *u);
    }

    fn scale(alpha: f64, x: &mut [Complex<F>])
    {
        let alpha = F::round_from(alpha);
        x.par_iter_mut()
            .with_min_len(MIN_LEN)
            .for_each(|u| *u = *u * alpha);
    }

    fn add(alpha: f64, x: &[Complex<F>], y: &mut [Complex<F>])
    {
        assert_eq!(x.len(), y.len());

        let alpha = F::round_from(alpha);
        y.par_iter_mut().zip(x.par_iter())
            .with_min_len(MIN_LEN)
            .for_each(|(v, u)| *v = *v + *u * alpha);
    }

    fn xpay(x: &[Complex<F>], beta: f64, y: &mut [Complex<F>])
    {
        assert_eq!(x.len(), y.len());

        let beta = F::round_from(beta);
        y.par_iter_mut().zip(x.par_iter())
            .with_min_len(MIN_LEN)
            .for_each(|(v, u)| *v = *u + *v * beta);
    }

    fn axpby(alpha: f64, x: &[Complex<F>], beta: f64, y: &mut [Complex<F>])
    {
        assert_eq!(x.len(), y.len());

        let alpha = F::round_from(alpha);
        let beta = F::round_from(beta);
        y.par_iter_mut().zip(x.par_iter())
            .with_min_len(MIN_LEN)
            .for_each(|(v, u)| *v = *u * alpha + *v * beta);
    }
}

//

#[test]
fn test_floatparallel_matches_generic()
{
    use float_eq::assert_float_eq;
    use crate::FloatGeneric;

    type LP = FloatParallel<f64>;
    type LG = FloatGeneric<f64>;

    let n = 100_000;
    let x: Vec<_> = (0.. n).map(|i| Complex::new((i % 17) as f64 * 0.1, -((i % 5) as f64))).collect();
    let mut y_p: Vec<_> = (0.. n).map(|i| Complex::new(1., (i % 3) as f64)).collect();
    let mut y_g = y_p.clone();

    assert_float_eq!(LP::norm2(&x), LG::norm2(&x), rmax <= 1e-12);
    let (ip_p, ip_g) = (LP::inner(&x, &y_p), LG::inner(&x, &y_g));
    assert_float_eq!(ip_p.re, ip_g.re, rmax <= 1e-12);
    assert_float_eq!(ip_p.im, ip_g.im, rmax <= 1e-12);

    LP::axpby(0.5, &x, -2., &mut y_p);
    LG::axpby(0.5, &x, -2., &mut y_g);
    LP::xpay(&x, 0.25, &mut y_p);
    LG::xpay(&x, 0.25, &mut y_g);
    assert_eq!(y_p, y_g);
}
