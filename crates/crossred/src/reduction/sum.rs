//! Elementwise sum, the baseline additive reduction.

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::formula::{Formula, Var};
use crate::reduction::{gradient_axis, Gradient, ReduceAxis, Reduction};

/// Sums the formula output over the inner index set. Accumulator and output
/// share the formula's width; the identity is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumReduction {
    formula: Formula,
    axis: ReduceAxis,
}

impl SumReduction {
    pub fn new(formula: Formula, axis: ReduceAxis) -> Self {
        SumReduction { formula, axis }
    }

    pub fn axis(&self) -> ReduceAxis {
        self.axis
    }

    pub fn output_dim(&self) -> usize {
        self.formula.dim()
    }
}

impl<T: Element> Reduction<T> for SumReduction {
    fn formula(&self) -> &Formula {
        &self.formula
    }

    fn axis(&self) -> ReduceAxis {
        self.axis
    }

    fn dim(&self) -> usize {
        self.formula.dim()
    }

    fn dim_red(&self) -> usize {
        self.formula.dim()
    }

    fn init(&self, acc: &mut [T]) {
        for slot in acc.iter_mut() {
            *slot = T::zero();
        }
    }

    fn fold(&self, acc: &mut [T], fij: &[T], _inner: usize) {
        for (slot, &x) in acc.iter_mut().zip(fij.iter()) {
            *slot = *slot + x;
        }
    }

    fn merge(&self, acc: &mut [T], other: &[T]) {
        for (slot, &x) in acc.iter_mut().zip(other.iter()) {
            *slot = *slot + x;
        }
    }

    fn finalize(&self, acc: &[T], out: &mut [T], _args: &[&[T]], _outer: usize) {
        out.copy_from_slice(acc);
    }

    /// The gradient of a sum is the sum of the gradients: a Sum reduction
    /// over the formula's symbolic partial derivative, indexed by `v`'s own
    /// index set. For a parameter variable the returned reduction keeps the
    /// forward axis and the caller still sums the per-row outputs.
    fn differentiate(&self, v: Var, gradin: Formula) -> Gradient {
        Gradient::Sum(SumReduction::new(
            self.formula.grad(v, gradin),
            gradient_axis(self.axis, v),
        ))
    }
}
