//! Recursive interpreter for formula trees.

use smallvec::{smallvec, SmallVec};

use crate::element::Element;
use crate::error::{EngineError, EngineResult};
use crate::formula::{Formula, VarCategory};

type Scratch<T> = SmallVec<[T; 8]>;

/// One evaluation site: a pair of indices plus the argument buffers.
///
/// `offsets` carries per-argument row offsets resolved from a batch shape
/// table; leave it empty for unbatched evaluation.
#[derive(Clone, Copy)]
pub struct EvalPoint<'a, T> {
    pub i: usize,
    pub j: usize,
    pub args: &'a [&'a [T]],
    pub offsets: &'a [usize],
}

impl Formula {
    /// Evaluates the formula at one pair of indices, writing `dim()` scalars
    /// into `out`.
    ///
    /// Out-of-range rows and width mismatches are reported as contract
    /// errors, never read out of bounds.
    pub fn eval_pair<T: Element>(
        &self,
        i: usize,
        j: usize,
        args: &[&[T]],
        out: &mut [T],
    ) -> EngineResult<()> {
        self.eval_at(
            &EvalPoint {
                i,
                j,
                args,
                offsets: &[],
            },
            out,
        )
    }

    /// Evaluates the formula at an [`EvalPoint`], honoring per-argument row
    /// offsets for batched buffers.
    pub fn eval_at<T: Element>(&self, point: &EvalPoint<'_, T>, out: &mut [T]) -> EngineResult<()> {
        if out.len() != self.dim() {
            return Err(EngineError::contract(format!(
                "output slice has length {} but formula {self} has width {}",
                out.len(),
                self.dim()
            )));
        }
        self.eval_node(point, out)
    }

    fn eval_node<T: Element>(&self, point: &EvalPoint<'_, T>, out: &mut [T]) -> EngineResult<()> {
        match self {
            Formula::Var(v) => {
                let arg = point.args.get(v.index).ok_or_else(|| {
                    EngineError::contract(format!(
                        "variable {v} addresses argument slot {} but only {} buffers were provided",
                        v.index,
                        point.args.len()
                    ))
                })?;
                let row = match v.category {
                    VarCategory::I => point.i,
                    VarCategory::J => point.j,
                    VarCategory::Param => 0,
                };
                let offset = point.offsets.get(v.index).copied().unwrap_or(0);
                let base = (offset + row) * v.dim;
                let end = base + v.dim;
                if end > arg.len() {
                    return Err(EngineError::contract(format!(
                        "row {row} of variable {v} reads [{base}, {end}) past buffer length {}",
                        arg.len()
                    )));
                }
                out.copy_from_slice(&arg[base..end]);
            }
            Formula::Zero(_) => {
                for slot in out.iter_mut() {
                    *slot = T::zero();
                }
            }
            Formula::IntCst(c) => {
                out[0] = T::from_int(*c);
            }
            Formula::Add(a, b) => {
                a.eval_node(point, out)?;
                let mut rhs: Scratch<T> = smallvec![T::zero(); b.dim()];
                b.eval_node(point, &mut rhs)?;
                for (slot, r) in out.iter_mut().zip(rhs.iter()) {
                    *slot = *slot + *r;
                }
            }
            Formula::Sub(a, b) => {
                a.eval_node(point, out)?;
                let mut rhs: Scratch<T> = smallvec![T::zero(); b.dim()];
                b.eval_node(point, &mut rhs)?;
                for (slot, r) in out.iter_mut().zip(rhs.iter()) {
                    *slot = *slot - *r;
                }
            }
            Formula::Neg(a) => {
                a.eval_node(point, out)?;
                for slot in out.iter_mut() {
                    *slot = -*slot;
                }
            }
            Formula::Mul(a, b) => {
                let mut lhs: Scratch<T> = smallvec![T::zero(); a.dim()];
                let mut rhs: Scratch<T> = smallvec![T::zero(); b.dim()];
                a.eval_node(point, &mut lhs)?;
                b.eval_node(point, &mut rhs)?;
                for (k, slot) in out.iter_mut().enumerate() {
                    let l = if lhs.len() == 1 { lhs[0] } else { lhs[k] };
                    let r = if rhs.len() == 1 { rhs[0] } else { rhs[k] };
                    *slot = l * r;
                }
            }
            Formula::Square(a) => {
                a.eval_node(point, out)?;
                for slot in out.iter_mut() {
                    *slot = *slot * *slot;
                }
            }
            Formula::Exp(a) => {
                a.eval_node(point, out)?;
                for slot in out.iter_mut() {
                    *slot = slot.exp();
                }
            }
            Formula::SumElems(a) => {
                let mut inner: Scratch<T> = smallvec![T::zero(); a.dim()];
                a.eval_node(point, &mut inner)?;
                out[0] = inner.iter().fold(T::zero(), |acc, &x| acc + x);
            }
            Formula::Broadcast(a, _) => {
                let mut inner: Scratch<T> = smallvec![T::zero(); 1];
                a.eval_node(point, &mut inner)?;
                for slot in out.iter_mut() {
                    *slot = inner[0];
                }
            }
            Formula::SqDist(a, b) => {
                let mut lhs: Scratch<T> = smallvec![T::zero(); a.dim()];
                let mut rhs: Scratch<T> = smallvec![T::zero(); b.dim()];
                a.eval_node(point, &mut lhs)?;
                b.eval_node(point, &mut rhs)?;
                out[0] = lhs
                    .iter()
                    .zip(rhs.iter())
                    .fold(T::zero(), |acc, (&l, &r)| acc + (l - r) * (l - r));
            }
        }
        Ok(())
    }
}
