//! Linear algebra

use core::fmt::{Debug, LowerExp};
use num_complex::{Complex, Complex64};
use num_traits::{Float, Zero};

/// Floating point storage type of lattice field components.
///
/// Fields may be stored in single precision,
/// while every reduction and every solver coefficient is carried in `f64`.
pub trait Real: Float + Debug + LowerExp + Send + Sync + 'static
{
    /// Rounds an `f64` coefficient to the storage precision.
    fn round_from(v: f64) -> Self;

    /// Widens a stored value to `f64`.
    fn widen(self) -> f64;
}

impl Real for f32
{
    fn round_from(v: f64) -> Self
    {
        v as f32
    }

    fn widen(self) -> f64
    {
        self as f64
    }
}

impl Real for f64
{
    fn round_from(v: f64) -> Self
    {
        v
    }

    fn widen(self) -> f64
    {
        self
    }
}

//

/// Linear algebra trait.
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Vector kernels over checkerboard-restricted field slices.
/// Vectors are slices of complex values `Complex<F>`.
/// Reductions return `f64` (or [`Complex64`]) whatever `F` is.
pub trait LinAlg
{
    /// Floating point data type of the real and imaginary parts of vector elements.
    type F: Real;

    /// Calculate squared 2-norm \\(\\|x\\|_2^2=\sum_i |x_i|^2\\), accumulated in `f64`.
    ///
    /// Returns the calculated value.
    /// * `x` is a vector \\(x\\).
    fn norm2(x: &[Complex<Self::F>]) -> f64;

    /// Calculate inner product \\(\langle x, y \rangle=\sum_i \bar{x}_i y_i\\), accumulated in `f64`.
    ///
    /// Returns the calculated value.
    /// * `x` is a vector \\(x\\), conjugated.
    /// * `y` is a vector \\(y\\).
    ///   `x` and `y` shall have the same length.
    fn inner(x: &[Complex<Self::F>], y: &[Complex<Self::F>]) -> Complex64;

    /// Copy from a vector to another vector.
    ///
    /// * `x` is a slice to copy.
    /// * `y` is a slice being copied to.
    ///   `x` and `y` shall have the same length.
    fn copy(x: &[Complex<Self::F>], y: &mut [Complex<Self::F>]);

    /// Calculate \\(\alpha x\\).
    ///
    /// * `alpha` is a scalar \\(\alpha\\).
    /// * `x` is a vector \\(x\\) before entry, \\(\alpha x\\) on exit.
    fn scale(alpha: f64, x: &mut [Complex<Self::F>]);

    /// Calculate \\(\alpha x + y\\).
    ///
    /// * `alpha` is a scalar \\(\alpha\\).
    /// * `x` is a vector \\(x\\).
    /// * `y` is a vector \\(y\\) before entry, \\(\alpha x + y\\) on exit.
    ///   `x` and `y` shall have the same length.
    fn add(alpha: f64, x: &[Complex<Self::F>], y: &mut [Complex<Self::F>]);

    /// Calculate \\(x + \beta y\\).
    ///
    /// * `x` is a vector \\(x\\).
    /// * `beta` is a scalar \\(\beta\\).
    /// * `y` is a vector \\(y\\) before entry, \\(x + \beta y\\) on exit.
    ///   `x` and `y` shall have the same length.
    fn xpay(x: &[Complex<Self::F>], beta: f64, y: &mut [Complex<Self::F>]);

    /// Calculate \\(\alpha x + \beta y\\).
    ///
    /// * `alpha` is a scalar \\(\alpha\\).
    /// * `x` is a vector \\(x\\).
    /// * `beta` is a scalar \\(\beta\\).
    /// * `y` is a vector \\(y\\) before entry, \\(\alpha x + \beta y\\) on exit.
    ///   `x` and `y` shall have the same length.
    fn axpby(alpha: f64, x: &[Complex<Self::F>], beta: f64, y: &mut [Complex<Self::F>]);

    /// Calculate 2-norm \\(\\|x\\|_2\\).
    fn norm(x: &[Complex<Self::F>]) -> f64
    {
        Self::norm2(x).sqrt()
    }

    /// Calculate real part of \\(\langle x, y \rangle\\).
    fn inner_re(x: &[Complex<Self::F>], y: &[Complex<Self::F>]) -> f64
    {
        Self::inner(x, y).re
    }

    /// Set all elements of `x` to zero.
    fn zero(x: &mut [Complex<Self::F>])
    {
        // not scale(0.): NaN * 0 stays NaN
        for u in x {
            *u = Complex::zero();
        }
    }
}
