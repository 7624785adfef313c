//! Arg-k-min: the indices of the k smallest values per formula component.

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::{EngineError, EngineResult};
use crate::formula::{Formula, Var};
use crate::reduction::view::{SortedRunReader, SortedRunView};
use crate::reduction::{Gradient, ReduceAxis, Reduction};

/// Tracks, per formula component, the `k` smallest values seen over the
/// inner index set together with the inner indices where they occurred.
///
/// Output width is `k * F::dim` (block `s` holds the `s`-th best index per
/// component, nearest first); the accumulator is twice that, holding each
/// component's run of `(value, index)` pairs sorted ascending by value.
/// Folding one candidate is an `O(k)` bounded insertion against the worst
/// kept entry. Ties keep the earliest inner index under any visit order.
/// The selection has no defined gradient; differentiation yields the
/// designated zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgKMin {
    formula: Formula,
    k: usize,
    axis: ReduceAxis,
}

impl ArgKMin {
    pub fn new(formula: Formula, k: usize, axis: ReduceAxis) -> EngineResult<Self> {
        if k == 0 {
            return Err(EngineError::contract("arg-k-min requires k >= 1"));
        }
        Ok(ArgKMin { formula, k, axis })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn width(&self) -> usize {
        self.formula.dim()
    }
}

impl<T: Element> Reduction<T> for ArgKMin {
    fn formula(&self) -> &Formula {
        &self.formula
    }

    fn axis(&self) -> ReduceAxis {
        self.axis
    }

    fn dim(&self) -> usize {
        self.k * self.width()
    }

    fn dim_red(&self) -> usize {
        2 * self.k * self.width()
    }

    fn init(&self, acc: &mut [T]) {
        let width = self.width();
        for comp in 0..width {
            let mut run = SortedRunView::new(acc, comp, width, self.k);
            for s in 0..self.k {
                run.set(s, T::infinity(), T::zero());
            }
        }
    }

    fn fold(&self, acc: &mut [T], fij: &[T], inner: usize) {
        let width = self.width();
        let index = T::encode_index(inner);
        for comp in 0..width {
            let mut run = SortedRunView::new(acc, comp, width, self.k);
            run.insert(fij[comp], index);
        }
    }

    fn merge(&self, acc: &mut [T], other: &[T]) {
        let width = self.width();
        for comp in 0..width {
            let reader = SortedRunReader::new(other, comp, width);
            for s in 0..self.k {
                let (value, index) = (reader.value(s), reader.index(s));
                let mut run = SortedRunView::new(acc, comp, width, self.k);
                run.insert(value, index);
            }
        }
    }

    fn finalize(&self, acc: &[T], out: &mut [T], _args: &[&[T]], _outer: usize) {
        let width = self.width();
        for comp in 0..width {
            let reader = SortedRunReader::new(acc, comp, width);
            for s in 0..self.k {
                out[s * width + comp] = reader.index(s);
            }
        }
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

    fn operator(k: usize) -> ArgKMin {
        ArgKMin::new(Formula::var(Var::y(0, 1)), k, ReduceAxis::OverJ).unwrap()
    }

    fn fold_all(red: &ArgKMin, values: &[f32]) -> Vec<f32> {
        let mut acc = vec![0.0f32; Reduction::<f32>::dim_red(red)];
        red.init(&mut acc);
        for (j, &value) in values.iter().enumerate() {
            red.fold(&mut acc, &[value], j);
        }
        acc
    }

    #[test]
    fn identity_is_k_copies_of_the_infinity_sentinel() {
        let red = operator(3);
        let mut acc = [0.0f32; 6];
        Reduction::<f32>::init(&red, &mut acc);
        let mut out = [0.0f32; 3];
        red.finalize(&acc, &mut out, &[], 0);
        assert_eq!(acc[0], f32::INFINITY);
        assert_eq!(acc[2], f32::INFINITY);
        assert_eq!(acc[4], f32::INFINITY);
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn earliest_index_wins_among_tied_values() {
        // Inner values [5, 1, 1, 9] with k = 2: both kept slots hold 1,
        // indices 1 then 2.
        let red = operator(2);
        let acc = fold_all(&red, &[5.0, 1.0, 1.0, 9.0]);
        assert_eq!(&acc[..], &[1.0, 1.0, 1.0, 2.0]);

        let mut out = [0.0f32; 2];
        red.finalize(&acc, &mut out, &[], 0);
        assert_eq!(out, [1.0, 2.0]);
    }

    #[test]
    fn visit_order_never_changes_the_result() {
        let red = operator(2);
        let baseline = fold_all(&red, &[5.0, 1.0, 1.0, 9.0]);

        let permutations: [[usize; 4]; 4] = [
            [3, 2, 1, 0],
            [1, 3, 0, 2],
            [2, 0, 3, 1],
            [0, 2, 1, 3],
        ];
        let values = [5.0f32, 1.0, 1.0, 9.0];
        for order in permutations {
            let mut acc = vec![0.0f32; Reduction::<f32>::dim_red(&red)];
            red.init(&mut acc);
            for j in order {
                red.fold(&mut acc, &[values[j]], j);
            }
            assert_eq!(acc, baseline, "order {order:?} diverged");
        }
    }

    #[test]
    fn merge_of_split_runs_matches_a_single_pass() {
        let red = operator(3);
        let values = [0.4f32, 0.9, 0.1, 0.4, 0.7, 0.2, 0.8];
        let whole = fold_all(&red, &values);

        let mut left = vec![0.0f32; Reduction::<f32>::dim_red(&red)];
        let mut right = vec![0.0f32; Reduction::<f32>::dim_red(&red)];
        red.init(&mut left);
        red.init(&mut right);
        for (j, &value) in values.iter().enumerate() {
            let half = if j % 2 == 0 { &mut left } else { &mut right };
            red.fold(half, &[value], j);
        }
        red.merge(&mut left, &right);
        assert_eq!(left, whole);
    }
}
