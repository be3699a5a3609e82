use std::time::Duration;
use latkrylov::prelude::*;
use latkrylov::*;

mod common;
use common::*;

//

fn subtest_mscg_equivalence<L: LinAlg<F=f64>>()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let lat = Lattice::shared(&[4, 4, 4, 4]);
    let blocks = Hopping::<L>::new(&lat, 7., 1., 0.5, 31);
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    let b = random_field::<f64>(&lat, 32);

    let shifts = [0.01, 0.1, 1., 10.];
    let tols = [1e-10, 1e-10, 1e-9, 1e-8];
    let mut xs = vec![Field::zeros(&lat); shifts.len()];

    let ms = MultiShiftCgSolver::<L>::new().par(|p| {p.max_iter = 1000});
    let rslts = ms.solve(&eo, &b, &shifts, &tols, &mut xs).unwrap();
    println!("{:?}", rslts);

    let total = rslts.iter().map(|r| r.n_count).max().unwrap();

    for (i, (&sigma, &tol)) in shifts.iter().zip(&tols).enumerate() {
        let a = NormalOp::<L, _>::new(&eo, sigma);

        assert!(rslts[i].converged);
        assert!(rslts[i].resid <= 2. * tol);
        assert!(rel_resid::<L, _>(&a, b.sub(Subset::Odd), xs[i].sub(Subset::Odd)) <= 2. * tol);

        let mut x = Field::zeros(&lat);
        let cg = CgSolver::<L>::new().par(|p| {p.rsd_target = tol});
        let rslt = cg.solve_hermitian(&a, &b, &mut x).unwrap();

        // both within tolerance of the same solution
        assert!(rel_diff(&xs[i], &x, Subset::Odd) < 1e-6);
        // same Krylov sequence, same retirement
        assert!(rslt.n_count.abs_diff(rslts[i].n_count) <= 1);
    }

    // the smallest shift is the slowest
    assert!(rslts[0].n_count.abs_diff(total) <= 1);
    assert!(rslts[3].n_count < rslts[0].n_count);
}

#[test]
fn test_mscg_equivalence()
{
    subtest_mscg_equivalence::<FloatGeneric<f64>>();
}

#[cfg(feature = "rayon")]
#[test]
fn test_mscg_equivalence_parallel()
{
    subtest_mscg_equivalence::<FloatParallel<f64>>();
}

//

#[test]
fn test_mscg_zero_shift()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 2, 2]);
    let blocks = Hopping::<L>::new(&lat, 7., 1., 1., 33);
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    let b = random_field::<f64>(&lat, 34);

    // a single zero shift is plain CG
    let mut xs = vec![Field::zeros(&lat)];
    let rslts = MultiShiftCgSolver::<L>::new().solve(&eo, &b, &[0.], &[1e-10], &mut xs).unwrap();

    let mut x = Field::zeros(&lat);
    let rslt = CgSolver::<L>::new().par(|p| {p.rsd_target = 1e-10}).solve(&eo, &b, &mut x).unwrap();

    assert_eq!(rslts[0].n_count, rslt.n_count);
    assert!(rel_diff(&xs[0], &x, Subset::Odd) < 1e-12);

    // no shift at all
    let rslts = MultiShiftCgSolver::<L>::new().solve(&eo, &b, &[], &[], &mut []).unwrap();
    assert!(rslts.is_empty());
}

#[test]
fn test_mscg_failure()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f64>;

    let lat = Lattice::shared(&[4, 4, 4, 4]);
    let other = Lattice::shared(&[2, 4, 4, 4]);
    let blocks = Hopping::<L>::new(&lat, 7., 1., 0.5, 35);
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    let b = random_field::<f64>(&lat, 36);

    let shifts = [0.5, 0.05];
    let mut xs = vec![Field::zeros(&lat); 2];

    let ms = MultiShiftCgSolver::<L>::new().par(|p| {p.max_iter = 0});
    let rslt = ms.solve(&eo, &b, &shifts, &[1e-8, 1e-8], &mut xs);
    assert_eq!(rslt, Err(SolverError::ConvergenceFailure {shift: Some(0), iter: 0, resid: 1.}));

    // the shift with tolerance 0 fails once the other converges
    let ms = MultiShiftCgSolver::<L>::new().par(|p| {p.max_iter = 60});
    let rslt = ms.solve(&eo, &b, &shifts, &[1e-8, 0.], &mut xs);
    println!("{:?}", rslt);
    assert!(matches!(rslt, Err(SolverError::ConvergenceFailure {shift: Some(1), iter: 60, ..})));

    let ms = ms.par(|p| {p.allow_partial = true});
    let rslts = ms.solve(&eo, &b, &shifts, &[1e-8, 0.], &mut xs).unwrap();
    assert!(rslts[0].converged);
    assert!(rslts[0].resid <= 2e-8);
    assert!(!rslts[1].converged);
    assert_eq!(rslts[1].n_count, 60);

    // and still fails long past the point where its recursive residual underflows
    let ms_long = MultiShiftCgSolver::<L>::new().par(|p| {p.max_iter = 5000});
    let rslt = ms_long.solve(&eo, &b, &shifts, &[1e-8, 0.], &mut xs);
    println!("{:?}", rslt);
    assert!(matches!(rslt, Err(SolverError::ConvergenceFailure {shift: Some(1), ..})));

    let ms_long = ms_long.par(|p| {p.allow_partial = true});
    let rslts = ms_long.solve(&eo, &b, &shifts, &[1e-8, 0.], &mut xs).unwrap();
    assert!(rslts[0].converged);
    assert!(!rslts[1].converged);
    assert!(rslts[1].n_count <= 5000);
    assert!(rslts[1].resid < 1e-10);

    // timeout wins over partial results
    let ms_timed = ms.clone().par(|p| {p.max_duration = Some(Duration::ZERO)});
    let rslt = ms_timed.solve(&eo, &b, &shifts, &[1e-8, 1e-8], &mut xs);
    assert_eq!(rslt, Err(SolverError::Timeout {iter: 0, resid: 1.}));

    let mut short = vec![Field::zeros(&lat)];
    assert_eq!(ms.solve(&eo, &b, &shifts, &[1e-8, 1e-8], &mut short), Err(SolverError::DimensionMismatch));

    let mut xs_other = vec![Field::zeros(&other); 2];
    assert_eq!(ms.solve(&eo, &b, &shifts, &[1e-8, 1e-8], &mut xs_other), Err(SolverError::DimensionMismatch));
}

#[test]
fn test_mscg_single_precision()
{
    let _ = env_logger::builder().is_test(true).try_init();

    type L = FloatGeneric<f32>;

    let lat = Lattice::shared(&[4, 4, 4, 4]);
    let blocks = Hopping::<L>::new(&lat, 7., 1., 0.5, 37);
    let eo = EvenOddPrecOp::<L, _>::new(&blocks).unwrap();
    let b = random_field::<f32>(&lat, 38);

    let shifts = [0.1, 1., 10.];
    let mut xs = vec![Field::zeros(&lat); 3];
    let rslts = MultiShiftCgSolver::<L>::new().solve(&eo, &b, &shifts, &[1e-4; 3], &mut xs).unwrap();

    for rslt in &rslts {
        assert!(rslt.converged);
        assert!(rslt.resid < 1e-3);
    }
}
