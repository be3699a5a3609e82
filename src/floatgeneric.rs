use core::marker::PhantomData;
use num_complex::{Complex, Complex64};
use num_traits::Zero;
use crate::solver::{LinAlg, Real};

/// `Real`-generic [`LinAlg`] implementation
///
/// All numeric operations are written in pure Rust and run serially.
/// `F` may be `f32` for single precision storage; reductions still accumulate in `f64`.
#[derive(Clone)]
pub struct FloatGeneric<F>
{
    ph_f: PhantomData<F>,
}

#[inline]
fn widen<F: Real>(u: Complex<F>) -> Complex64
{
    Complex64::new(u.re.widen(), u.im.widen())
}

impl<F: Real> LinAlg for FloatGeneric<F>
{
    type F = F;

    fn norm2(x: &[Complex<F>]) -> f64
    {
        let mut sum = 0.;
        for u in x {
            sum += widen(*u).norm_sqr();
        }
        sum
    }

    fn inner(x: &[Complex<F>], y: &[Complex<F>]) -> Complex64
    {
        assert_eq!(x.len(), y.len());

        let mut sum = Complex64::zero();
        for (u, v) in x.iter().zip(y) {
            sum += widen(*u).conj() * widen(*v);
        }
        sum
    }

    fn copy(x: &[Complex<F>], y: &mut [Complex<F>])
    {
        assert_eq!(x.len(), y.len());

        y.copy_from_slice(x);
    }

    fn scale(alpha: f64, x: &mut [Complex<F>])
    {
        let alpha = F::round_from(alpha);
        for u in x {
            *u = *u * alpha;
        }
    }

    fn add(alpha: f64, x: &[Complex<F>], y: &mut [Complex<F>])
    {
        assert_eq!(x.len(), y.len());

        let alpha = F::round_from(alpha);
        for (u, v) in x.iter().zip(y) {
            *v = *v + *u * alpha;
        }
    }

    fn xpay(x: &[Complex<F>], beta: f64, y: &mut [Complex<F>])
    {
        assert_eq!(x.len(), y.len());

        let beta = F::round_from(beta);
        for (u, v) in x.iter().zip(y) {
            *v = *u + *v * beta;
        }
    }

    fn axpby(alpha: f64, x: &[Complex<F>], beta: f64, y: &mut [Complex<F>])
    {
        assert_eq!(x.len(), y.len());

        let alpha = F::round_from(alpha);
        let beta = F::round_from(beta);
        for (u, v) in x.iter().zip(y) {
            *v = *u * alpha + *v * beta;
        }
    }
}

//

#[test]
fn test_floatgeneric1()
{
    use float_eq::assert_float_eq;

    type L = FloatGeneric<f64>;

    let x = &[Complex::new(1., 2.), Complex::new(-3., 0.5)];
    let y = &mut [Complex::new(0.5, -1.), Complex::new(2., 2.)];

    assert_float_eq!(L::norm2(x), 1. + 4. + 9. + 0.25, abs <= 1e-12);

    // conj(1+2i)(0.5-i) + conj(-3+0.5i)(2+2i) = (-1.5-2i) + (-5-7i)
    let ip = L::inner(x, y);
    assert_float_eq!(ip.re, -6.5, abs <= 1e-12);
    assert_float_eq!(ip.im, -9., abs <= 1e-12);
    assert_float_eq!(L::inner_re(y, x), -6.5, abs <= 1e-12);

    L::axpby(2., x, -1., y);
    assert_eq!(y[0], Complex::new(1.5, 5.));
    assert_eq!(y[1], Complex::new(-8., -1.));

    L::xpay(x, 0.5, y);
    assert_eq!(y[0], Complex::new(1.75, 4.5));

    L::add(-1., x, y);
    assert_eq!(y[0], Complex::new(0.75, 2.5));

    L::zero(y);
    assert_float_eq!(L::norm(y), 0., abs <= 0.);
}

#[test]
fn test_floatgeneric_single()
{
    use float_eq::assert_float_eq;

    type L = FloatGeneric<f32>;

    // an f32 accumulator would drift over 2^20 terms
    let n = 1 << 20;
    let x = vec![Complex::new(1e-4f32, 0.); n];
    assert_float_eq!(L::norm2(&x), 1e-8 * n as f64, rmax <= 1e-6);
}
