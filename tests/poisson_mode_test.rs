//! Isolation scenario for the pressure solver, active only with the
//! `poisson-test` feature: the Poisson RHS is frozen to 1 and the pressure
//! is zeroed before the correction, so after one step P holds exactly the
//! solver output and nothing else.
//!
//! Run with `cargo test --features poisson-test`.

#![cfg(feature = "poisson-test")]

use fdns_rs::{
    Config, EulerCn, Grid, JacobiPressureSolver, NullSink, PlainScalar, PressureSolver,
    ScalarField, VectorField,
};

#[test]
fn test_single_step_exposes_raw_poisson_solution() {
    let make_grid = || {
        Grid::serial(Config {
            points: [8, 8, 8],
            ..Config::default()
        })
        .unwrap()
    };

    let grid = make_grid();
    let mut v = VectorField::new(&grid);
    let mut p = ScalarField::new(&grid, "P");
    v.impose_bcs(&grid);

    let mut solver = EulerCn::new(&grid, 0.01, 0.01, 0.01).unwrap();
    let mut sink = NullSink;
    solver.advance(&grid, &mut v, &mut p, &mut sink).unwrap();

    // reference: the pressure solver run standalone on the same frozen RHS
    let grid2 = make_grid();
    let mut reference = PlainScalar::new(&grid2);
    let mut rhs = PlainScalar::new(&grid2);
    rhs.fill(1.0);
    let mut poisson = JacobiPressureSolver::new(&grid2);
    poisson.solve(&grid2, &mut reference, &rhs).unwrap();

    grid.core.for_each(|q| {
        assert!(
            (p.f.data[q] - reference.f[q]).abs() < 1e-12,
            "P at {q:?}: {} vs {}",
            p.f.data[q],
            reference.f[q]
        );
    });

    // the rest of the state is untouched by the non-Poisson path
    assert!(v.max_abs(&grid) < 1e-12);
}
