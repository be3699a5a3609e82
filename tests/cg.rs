use std::time::Duration;
use num_complex::Complex;
use float_eq::assert_float_eq;
use latkrylov::prelude::*;
use latkrylov::*;

mod common;
use common::*;

//

fn subtest_cg_random<L: LinAlg<F=f64>>()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let lat = Lattice::shared(&[4, 4, 4, 4]);
    let blocks = Hopping::<L>::new(&lat, 7., 1., 0.5, 1);
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    let d = eo.unprec();

    let b = random_field::<f64>(&lat, 2);

    for rsd_target in [1e-4, 1e-8, 1e-11] {
        let mut x = Field::zeros(&lat);

        let s = CgSolver::<L>::new().par(|p| {
            p.rsd_target = rsd_target;
            p.max_iter = 1000;
        });
        let rslt = s.solve(&d, &b, &mut x).unwrap();
        println!("{:?}", rslt);

        assert!(rslt.converged);
        assert!(rslt.n_count > 1);

        let a = NormalOp::<L, _>::new(&d, 0.);
        let resid = rel_resid::<L, _>(&a, b.sub(Subset::Full), x.sub(Subset::Full));
        assert_float_eq!(resid, rslt.resid, rmax <= 1e-6);
        assert!(resid <= rsd_target * 1.01);
    }
}

#[test]
fn test_cg_random()
{
    subtest_cg_random::<FloatGeneric<f64>>();
}

#[cfg(feature = "rayon")]
#[test]
fn test_cg_random_parallel()
{
    subtest_cg_random::<FloatParallel<f64>>();
}

//

fn subtest_cg_identity<L: LinAlg<F=f64>>()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let lat = Lattice::shared(&[4, 4, 4, 4]);
    assert_eq!(lat.subset_len(Subset::Even), 128);
    assert_eq!(lat.subset_len(Subset::Odd), 128);

    let mut b = Field::zeros(&lat);
    b.fill(Subset::Full, Complex::new(1., 0.));

    for cb in [Subset::Even, Subset::Odd] {
        let m = DiagOp::<L>::identity(&lat, cb);
        let mut x = Field::zeros(&lat);

        let s = CgSolver::<L>::new().par(|p| {p.rsd_target = 1e-10});
        let rslt = s.solve(&m, &b, &mut x).unwrap();

        assert_eq!(rslt.n_count, 1);
        assert!(rslt.converged);
        assert_eq!(x.sub(cb), b.sub(cb));
        assert!(x.sub(cb.other()).iter().all(|u| *u == Complex::new(0., 0.)));
    }
}

#[test]
fn test_cg_identity()
{
    subtest_cg_identity::<FloatGeneric<f64>>();
}

#[cfg(feature = "rayon")]
#[test]
fn test_cg_identity_parallel()
{
    subtest_cg_identity::<FloatParallel<f64>>();
}

//

#[test]
fn test_cg_warm_start()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 2, 2]);
    let blocks = Hopping::<L>::new(&lat, 7., 1., 1., 3);
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    let b = random_field::<f64>(&lat, 4);

    let s = CgSolver::<L>::new().par(|p| {p.rsd_target = 1e-9});

    let mut x = Field::zeros(&lat);
    let cold = s.solve(&eo, &b, &mut x).unwrap();

    // converged guess needs no iteration
    let again = s.solve(&eo, &b, &mut x).unwrap();
    assert_eq!(again.n_count, 0);
    assert!(again.resid <= 1e-9 * 1.01);

    // a close guess needs fewer
    let s_tight = s.par(|p| {p.rsd_target = 1e-12});
    let mut y = Field::zeros(&lat);
    let from_zero = s_tight.solve(&eo, &b, &mut y).unwrap();
    let warm = s_tight.solve(&eo, &b, &mut x).unwrap();
    assert!(warm.n_count < from_zero.n_count);
    assert!(cold.n_count < from_zero.n_count);
}

#[test]
fn test_cg_failure()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 4, 4]);
    let blocks = Hopping::<L>::new(&lat, 7., 1., 0.5, 5);
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    let b = random_field::<f64>(&lat, 6);

    let mut x = Field::zeros(&lat);
    let rslt = CgSolver::<L>::new().par(|p| {p.max_iter = 0}).solve(&eo, &b, &mut x);
    println!("{:?}", rslt);
    assert_eq!(rslt, Err(SolverError::ConvergenceFailure {shift: None, iter: 0, resid: 1.}));

    let rslt = CgSolver::<L>::new().par(|p| {p.rsd_target = 0.; p.max_iter = 30}).solve(&eo, &b, &mut x);
    match rslt {
        Err(SolverError::ConvergenceFailure {shift: None, iter, resid}) => {
            assert_eq!(iter, 30);
            assert!(resid > 0. && resid < 1.);
        },
        _ => panic!("{:?}", rslt),
    }

    // long past the point where the recursive residual underflows
    let mut x = Field::zeros(&lat);
    let rslt = CgSolver::<L>::new().par(|p| {p.rsd_target = 0.; p.max_iter = 5000}).solve(&eo, &b, &mut x);
    println!("{:?}", rslt);
    match rslt {
        Err(SolverError::ConvergenceFailure {shift: None, iter, resid}) => {
            assert!(iter <= 5000);
            assert!(resid < 1e-10);
        },
        _ => panic!("{:?}", rslt),
    }

    let mut x = Field::zeros(&lat);
    let rslt = CgSolver::<L>::new().par(|p| {p.max_duration = Some(Duration::ZERO)}).solve(&eo, &b, &mut x);
    assert_eq!(rslt, Err(SolverError::Timeout {iter: 0, resid: 1.}));
}

#[test]
fn test_cg_not_finite()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 2, 2]);
    let blocks = Hopping::<L>::new(&lat, 7., 1., 0.5, 10);
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    let b = random_field::<f64>(&lat, 11);
    let s = CgSolver::<L>::new();

    // NaN in the guess
    let mut x = Field::zeros(&lat);
    x.sub_mut(Subset::Odd)[7] = Complex::new(f64::NAN, 0.);
    assert_eq!(s.solve(&eo, &b, &mut x), Err(SolverError::Breakdown {iter: 0}));

    // NaN in the source, as the multi-shift solver reports it
    let mut b_nan = b.clone();
    b_nan.sub_mut(Subset::Odd)[7] = Complex::new(0., f64::NAN);
    let mut x = Field::zeros(&lat);
    assert_eq!(s.solve(&eo, &b_nan, &mut x), Err(SolverError::Breakdown {iter: 0}));

    let mut xs = vec![Field::zeros(&lat)];
    let rslt = MultiShiftCgSolver::<L>::new().solve(&eo, &b_nan, &[0.1], &[1e-8], &mut xs);
    assert_eq!(rslt, Err(SolverError::Breakdown {iter: 0}));
}

#[test]
fn test_cg_breakdown()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let neg = DiagOp::<L>::from_fn(&lat, Subset::Full, |_| Complex::new(-1., 0.));
    let b = random_field::<f64>(&lat, 7);
    let mut x = Field::zeros(&lat);

    let rslt = CgSolver::<L>::new().solve_hermitian(&neg, &b, &mut x);
    assert_eq!(rslt, Err(SolverError::Breakdown {iter: 0}));

    // while its normal equations are fine
    let rslt = CgSolver::<L>::new().solve(&neg, &b, &mut x).unwrap();
    assert_eq!(rslt.n_count, 1);
}

#[test]
fn test_cg_dimension_mismatch()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 2, 2]);
    let other = Lattice::shared(&[4, 2, 4, 2]);
    let m = DiagOp::<L>::identity(&lat, Subset::Odd);

    let s = CgSolver::<L>::new();
    assert_eq!(s.solve(&m, &Field::zeros(&other), &mut Field::zeros(&lat)), Err(SolverError::DimensionMismatch));
    assert_eq!(s.solve(&m, &Field::zeros(&lat), &mut Field::zeros(&other)), Err(SolverError::DimensionMismatch));
}

//

#[test]
fn test_cg_single_precision()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L32 = FloatGeneric<f32>;
    type L64 = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 4, 4]);
    let b = random_field::<f64>(&lat, 8);

    let blocks64 = Hopping::<L64>::new(&lat, 7., 1., 0.5, 9);
    let eo64 = EvenOddPrecOp::<L64, _>::new(&blocks64).unwrap();
    let mut x64 = Field::zeros(&lat);
    CgSolver::<L64>::new().par(|p| {p.rsd_target = 1e-10}).solve(&eo64, &b, &mut x64).unwrap();

    let blocks32 = Hopping::<L32>::new(&lat, 7., 1., 0.5, 9);
    let eo32 = EvenOddPrecOp::<L32, _>::new(&blocks32).unwrap();
    let mut x32 = Field::zeros(&lat);
    let rslt = CgSolver::<L32>::new().par(|p| {p.rsd_target = 1e-4}).solve(&eo32, &b.to_precision(), &mut x32).unwrap();

    assert!(rslt.converged);
    assert!(rslt.resid < 1e-3);
    assert!(rel_diff(&x32.to_precision::<f64>(), &x64, Subset::Odd) < 1e-2);
}
