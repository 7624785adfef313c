//! Reduction operators and their accumulator contracts.
//!
//! A reduction operator is a stateless strategy: it defines the accumulator
//! layout and four operations — write the identity, fold one per-pair
//! formula output, merge two partial accumulators, and finalize into the
//! output layout. Drivers own every accumulator and walk it through the
//! `init -> (fold | merge)* -> finalize` lifecycle exactly once per outer
//! index; no accumulator state ever crosses outer indices.

mod argkmin;
mod min_argmin;
mod sum;
mod view;

pub use argkmin::ArgKMin;
pub use min_argmin::MinArgMin;
pub use sum::SumReduction;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::formula::{Formula, Var, VarCategory};

/// Selects which index set runs the inner (reduced) loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceAxis {
    /// Reduce over `j`; outputs are indexed by `i`.
    OverJ,
    /// Reduce over `i`; outputs are indexed by `j`.
    OverI,
}

impl ReduceAxis {
    /// Number of output rows.
    pub fn outer_count(self, nx: usize, ny: usize) -> usize {
        match self {
            ReduceAxis::OverJ => nx,
            ReduceAxis::OverI => ny,
        }
    }

    /// Number of inner-loop iterations per output row.
    pub fn inner_count(self, nx: usize, ny: usize) -> usize {
        match self {
            ReduceAxis::OverJ => ny,
            ReduceAxis::OverI => nx,
        }
    }

    /// Maps an `(outer, inner)` pair to the formula's `(i, j)` evaluation
    /// point.
    pub fn pair(self, outer: usize, inner: usize) -> (usize, usize) {
        match self {
            ReduceAxis::OverJ => (outer, inner),
            ReduceAxis::OverI => (inner, outer),
        }
    }
}

/// Reduction strategy folding a stream of per-pair formula outputs into one
/// output row per outer index.
///
/// `merge` combines two accumulators of identical layout and must agree
/// with `fold` on the final result for any split of the inner index set;
/// selection operators resolve ties by the indices already embedded in the
/// accumulators, so the agreement holds under any visit order.
pub trait Reduction<T: Element>: Send + Sync {
    /// The formula whose per-pair outputs are folded.
    fn formula(&self) -> &Formula;

    /// Which index set runs the inner loop.
    fn axis(&self) -> ReduceAxis;

    /// Width of one finalized output row.
    fn dim(&self) -> usize;

    /// Width of the accumulator.
    fn dim_red(&self) -> usize;

    /// Writes the operator identity into `acc`; idempotent.
    fn init(&self, acc: &mut [T]);

    /// Folds one formula output `fij` associated with inner index `inner`.
    fn fold(&self, acc: &mut [T], fij: &[T], inner: usize);

    /// Folds another accumulator of the same layout into `acc`.
    fn merge(&self, acc: &mut [T], other: &[T]);

    /// Transforms the accumulator into the output layout; written exactly
    /// once. Receives the original argument buffers and the outer index for
    /// operators that re-derive values from their inputs.
    fn finalize(&self, acc: &[T], out: &mut [T], args: &[&[T]], outer: usize);

    /// Reduction + formula pair computing the gradient of this reduction's
    /// output with respect to `v`, contracted against the upstream seed
    /// `gradin`.
    fn differentiate(&self, v: Var, gradin: Formula) -> Gradient;
}

/// Result of differentiating a reduction.
///
/// The zero case is a distinct variant, not a formula that evaluates to
/// zero: selection reductions (min, arg-k-min) are locally constant almost
/// everywhere, so their gradient is the designated zero of the target
/// variable's own width and category, and no formula evaluation happens at
/// all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gradient {
    /// Additive gradient: a Sum reduction over the symbolic partial
    /// derivative.
    Sum(SumReduction),
    /// Designated zero for non-differentiable selections.
    Zero { dim: usize, category: VarCategory },
}

impl Gradient {
    /// Width of one gradient output row.
    pub fn dim(&self) -> usize {
        match self {
            Gradient::Sum(red) => red.output_dim(),
            Gradient::Zero { dim, .. } => *dim,
        }
    }

    /// Number of gradient output rows for index set sizes `nx` and `ny`.
    pub fn output_rows(&self, nx: usize, ny: usize) -> usize {
        match self {
            Gradient::Sum(red) => red.axis().outer_count(nx, ny),
            Gradient::Zero { category, .. } => match category {
                VarCategory::I => nx,
                VarCategory::J => ny,
                VarCategory::Param => 1,
            },
        }
    }
}

/// Axis of the gradient reduction for a target variable: gradients are
/// indexed by the variable's own index set, so the reduction runs over the
/// other one. Parameter gradients keep the forward axis; the caller still
/// owns the final sum over output rows.
pub(crate) fn gradient_axis(axis: ReduceAxis, v: Var) -> ReduceAxis {
    match v.category {
        VarCategory::I => ReduceAxis::OverJ,
        VarCategory::J => ReduceAxis::OverI,
        VarCategory::Param => axis,
    }
}
