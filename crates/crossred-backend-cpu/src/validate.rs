//! Invocation-contract validation shared by the drivers.

use crossred::{Element, EngineError, EngineResult, Reduction, VarCategory};

/// Fail-fast validation for a dense invocation: formula widths, argument
/// buffer lengths against the variable list, and the output buffer size.
pub(crate) fn validate_dense<T, R>(
    red: &R,
    nx: usize,
    ny: usize,
    gamma: &[T],
    args: &[&[T]],
) -> EngineResult<()>
where
    T: Element,
    R: Reduction<T> + ?Sized,
{
    let formula = red.formula();
    formula.check()?;
    let slots = formula.arg_slots()?;
    if args.len() != slots {
        return Err(EngineError::contract(format!(
            "formula {formula} expects {slots} argument buffers, {} provided",
            args.len()
        )));
    }
    for v in formula.vars()? {
        let rows = match v.category {
            VarCategory::I => nx,
            VarCategory::J => ny,
            VarCategory::Param => 1,
        };
        let expected = rows * v.dim;
        if args[v.index].len() != expected {
            return Err(EngineError::contract(format!(
                "buffer for variable {v} has length {}, expected {expected} ({rows} rows of width {})",
                args[v.index].len(),
                v.dim
            )));
        }
    }
    if red.dim() == 0 || red.dim_red() == 0 {
        return Err(EngineError::contract("reduction has zero output width"));
    }
    let expected = red.axis().outer_count(nx, ny) * red.dim();
    if gamma.len() != expected {
        return Err(EngineError::contract(format!(
            "output buffer has length {}, expected {expected}",
            gamma.len()
        )));
    }
    Ok(())
}
