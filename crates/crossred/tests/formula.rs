use anyhow::Result;

use crossred::{EngineError, Formula, Var};

fn gaussian(x: Var, y: Var) -> Formula {
    Formula::exp(Formula::neg(Formula::sq_dist(
        Formula::var(x),
        Formula::var(y),
    )))
}

#[test]
fn var_eval_copies_the_addressed_row() -> Result<()> {
    let f = Formula::var(Var::x(0, 2));
    let x: &[f64] = &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let mut out = [0.0f64; 2];
    f.eval_pair(2, 0, &[x], &mut out)?;
    assert_eq!(out, [5.0, 6.0]);
    Ok(())
}

#[test]
fn gaussian_kernel_evaluates_pointwise() -> Result<()> {
    let f = gaussian(Var::x(0, 2), Var::y(1, 2));
    f.check()?;
    assert_eq!(f.dim(), 1);

    let x: &[f64] = &[0.0, 0.0, 1.0, 1.0];
    let y: &[f64] = &[3.0, 4.0, 0.0, 0.0];
    let mut out = [0.0f64];
    // i = 0 against y row 0: squared distance 25.
    f.eval_pair(0, 0, &[x, y], &mut out)?;
    assert!((out[0] - (-25.0f64).exp()).abs() < 1e-12);
    // i = 1 against y row 1: squared distance 2.
    f.eval_pair(1, 1, &[x, y], &mut out)?;
    assert!((out[0] - (-2.0f64).exp()).abs() < 1e-12);
    Ok(())
}

#[test]
fn scalar_broadcast_multiplies_every_component() -> Result<()> {
    let f = Formula::mul(Formula::var(Var::param(0, 1)), Formula::var(Var::y(1, 3)));
    f.check()?;
    assert_eq!(f.dim(), 3);

    let p: &[f32] = &[2.0];
    let y: &[f32] = &[1.0, 2.0, 3.0];
    let mut out = [0.0f32; 3];
    f.eval_pair(0, 0, &[p, y], &mut out)?;
    assert_eq!(out, [2.0, 4.0, 6.0]);
    Ok(())
}

#[test]
fn width_mismatch_is_rejected_before_evaluation() {
    let f = Formula::Add(
        Box::new(Formula::var(Var::x(0, 2))),
        Box::new(Formula::var(Var::y(1, 3))),
    );
    match f.check() {
        Err(EngineError::MalformedFormula { .. }) => {}
        other => panic!("expected malformed-formula error, got {other:?}"),
    }
}

#[test]
fn conflicting_slot_declarations_are_rejected() {
    let f = Formula::mul(Formula::var(Var::x(0, 1)), Formula::var(Var::y(0, 3)));
    assert!(f.check().is_err());
}

#[test]
fn out_of_range_row_is_reported_not_read() {
    let f = Formula::var(Var::x(0, 2));
    let x: &[f32] = &[1.0, 2.0];
    let mut out = [0.0f32; 2];
    let err = f.eval_pair(5, 0, &[x], &mut out).unwrap_err();
    assert!(matches!(err, EngineError::Contract { .. }));
}

#[test]
fn display_names_variables_by_category() {
    let f = gaussian(Var::x(0, 3), Var::y(1, 3));
    assert_eq!(f.to_string(), "Exp(-SqDist(x0, y1))");
}

#[test]
fn formulas_round_trip_through_json() -> Result<()> {
    let f = Formula::mul(
        Formula::var(Var::param(2, 1)),
        gaussian(Var::x(0, 3), Var::y(1, 3)),
    );
    let encoded = serde_json::to_string(&f)?;
    let decoded: Formula = serde_json::from_str(&encoded)?;
    assert_eq!(decoded, f);
    Ok(())
}

#[test]
fn gradient_of_square_matches_hand_derivation() -> Result<()> {
    // d/dx (x - y)^2 seeded with g is 2 * (x - y) * g, elementwise.
    let x = Var::x(0, 2);
    let f = Formula::square(Formula::sub(
        Formula::var(x),
        Formula::var(Var::y(1, 2)),
    ));
    let grad = f.grad(x, Formula::var(Var::x(2, 2)));
    grad.check()?;
    assert_eq!(grad.dim(), 2);

    let xs: &[f64] = &[3.0, -1.0];
    let ys: &[f64] = &[1.0, 1.0];
    let seed: &[f64] = &[0.5, 2.0];
    let mut out = [0.0f64; 2];
    grad.eval_pair(0, 0, &[xs, ys, seed], &mut out)?;
    assert_eq!(out, [2.0 * 2.0 * 0.5, 2.0 * -2.0 * 2.0]);
    Ok(())
}

#[test]
fn gradient_with_respect_to_absent_variable_is_zero() {
    let f = gaussian(Var::x(0, 2), Var::y(1, 2));
    let absent = Var::param(3, 4);
    let grad = f.grad(absent, Formula::var(Var::x(2, 1)));
    assert_eq!(grad, Formula::Zero(4));
}

#[test]
fn sum_and_broadcast_are_adjoint_in_gradients() -> Result<()> {
    // f = Sum(x0); seeding with scalar g gives the constant vector g.
    let x = Var::x(0, 3);
    let f = Formula::sum_elems(Formula::var(x));
    let grad = f.grad(x, Formula::var(Var::x(1, 1)));
    grad.check()?;
    assert_eq!(grad.dim(), 3);

    let xs: &[f64] = &[1.0, 2.0, 3.0];
    let seed: &[f64] = &[7.0];
    let mut out = [0.0f64; 3];
    grad.eval_pair(0, 0, &[xs, seed], &mut out)?;
    assert_eq!(out, [7.0, 7.0, 7.0]);
    Ok(())
}
