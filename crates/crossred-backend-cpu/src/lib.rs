//! Reference CPU convolution drivers for the `crossred` engine.
//!
//! [`CpuConv`] streams the full `nx * ny` cross product; [`CpuConvRanges`]
//! restricts evaluation to an explicit tile list with optional batch
//! broadcasting. Both validate the whole invocation contract up front and
//! then run pure arithmetic.

pub mod dense;
pub mod ranged;
mod validate;

pub use dense::CpuConv;
pub use ranged::CpuConvRanges;

use crossred::{Element, EngineError, EngineResult, Gradient};

/// Runs a differentiation result through the dense driver.
///
/// Sum gradients stream like any other reduction; designated zeros write
/// zeros of the target variable's own width and row count without touching
/// a formula, so a zero gradient is observably distinct from a formula
/// that merely evaluates to zero.
pub fn run_gradient_dense<T: Element>(
    grad: &Gradient,
    nx: usize,
    ny: usize,
    gamma: &mut [T],
    args: &[&[T]],
) -> EngineResult<()> {
    match grad {
        Gradient::Sum(red) => CpuConv::run(red, nx, ny, gamma, args),
        Gradient::Zero { .. } => {
            let expected = grad.output_rows(nx, ny) * grad.dim();
            if gamma.len() != expected {
                return Err(EngineError::contract(format!(
                    "gradient output buffer has length {}, expected {expected}",
                    gamma.len()
                )));
            }
            for slot in gamma.iter_mut() {
                *slot = T::zero();
            }
            Ok(())
        }
    }
}
