//! Vectorized min + argmin selection.

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::formula::{Formula, Var};
use crate::reduction::view::{MinArgMinReader, MinArgMinView};
use crate::reduction::{Gradient, ReduceAxis, Reduction};

/// Tracks, per formula component, the minimal value seen over the inner
/// index set and the inner index where it occurred.
///
/// Output and accumulator are both `2 * F::dim` wide: values first, then
/// the winning indices stored in the element type (callers reinterpret via
/// [`Element::decode_index`]). Ties keep the earliest inner index under any
/// visit order. The selection has no defined gradient; differentiation
/// yields the designated zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinArgMin {
    formula: Formula,
    axis: ReduceAxis,
}

impl MinArgMin {
    pub fn new(formula: Formula, axis: ReduceAxis) -> Self {
        MinArgMin { formula, axis }
    }

    fn width(&self) -> usize {
        self.formula.dim()
    }
}

impl<T: Element> Reduction<T> for MinArgMin {
    fn formula(&self) -> &Formula {
        &self.formula
    }

    fn axis(&self) -> ReduceAxis {
        self.axis
    }

    fn dim(&self) -> usize {
        2 * self.width()
    }

    fn dim_red(&self) -> usize {
        2 * self.width()
    }

    fn init(&self, acc: &mut [T]) {
        let width = self.width();
        let mut view = MinArgMinView::new(acc, width);
        for k in 0..width {
            view.set(k, T::infinity(), T::zero());
        }
    }

    fn fold(&self, acc: &mut [T], fij: &[T], inner: usize) {
        let width = self.width();
        let index = T::encode_index(inner);
        let mut view = MinArgMinView::new(acc, width);
        for k in 0..width {
            view.offer(k, fij[k], index);
        }
    }

    fn merge(&self, acc: &mut [T], other: &[T]) {
        let width = self.width();
        let reader = MinArgMinReader::new(other, width);
        let mut view = MinArgMinView::new(acc, width);
        for k in 0..width {
            view.offer(k, reader.value(k), reader.index(k));
        }
    }

    fn finalize(&self, acc: &[T], out: &mut [T], _args: &[&[T]], _outer: usize) {
        out.copy_from_slice(acc);
    }

    fn differentiate(&self, v: Var, _gradin: Formula) -> Gradient {
        Gradient::Zero {
            dim: v.dim,
            category: v.category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator() -> MinArgMin {
        MinArgMin::new(Formula::var(Var::y(0, 1)), ReduceAxis::OverJ)
    }

    #[test]
    fn identity_finalizes_to_infinity_and_index_zero() {
        let red = operator();
        let mut acc = [0.0f32; 2];
        Reduction::<f32>::init(&red, &mut acc);
        let mut out = [0.0f32; 2];
        red.finalize(&acc, &mut out, &[], 0);
        assert_eq!(out[0], f32::INFINITY);
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn first_minimal_index_survives_a_tie() {
        let red = operator();
        let mut acc = [0.0f32; 2];
        Reduction::<f32>::init(&red, &mut acc);
        for (j, value) in [4.0f32, 2.0, 2.0, 3.0].into_iter().enumerate() {
            red.fold(&mut acc, &[value], j);
        }
        assert_eq!(acc, [2.0, 1.0]);
    }

    #[test]
    fn merge_agrees_with_folding_everything_into_one_accumulator() {
        let red = operator();
        let values = [5.0f32, 2.0, 7.0, 2.0, 9.0];

        let mut whole = [0.0f32; 2];
        Reduction::<f32>::init(&red, &mut whole);
        for (j, value) in values.into_iter().enumerate() {
            red.fold(&mut whole, &[value], j);
        }

        let (mut left, mut right) = ([0.0f32; 2], [0.0f32; 2]);
        Reduction::<f32>::init(&red, &mut left);
        Reduction::<f32>::init(&red, &mut right);
        for (j, value) in values.into_iter().enumerate() {
            let half = if j < 2 { &mut left } else { &mut right };
            red.fold(half, &[value], j);
        }
        // Merging in either order lands on the same winner.
        let mut merged = right;
        red.merge(&mut merged, &left);
        assert_eq!(merged, whole);
    }
}
