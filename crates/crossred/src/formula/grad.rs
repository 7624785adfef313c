//! Symbolic reverse-mode rewrite of formula trees.

use crate::formula::{Formula, Var};

impl Formula {
    /// Gradient of the formula with respect to `v`, contracted against the
    /// upstream seed `gradin`.
    ///
    /// `gradin` must have width `self.dim()`; the result has width `v.dim`.
    /// The rewrite is purely symbolic: leaves matching `v` absorb the seed,
    /// every other leaf contributes a zero, and arithmetic nodes apply their
    /// adjoint rules. Smart constructors fold the zeros away so gradient
    /// trees stay close to their handwritten form.
    pub fn grad(&self, v: Var, gradin: Formula) -> Formula {
        match self {
            Formula::Var(u) => {
                if *u == v {
                    gradin
                } else {
                    Formula::Zero(v.dim)
                }
            }
            Formula::Zero(_) | Formula::IntCst(_) => Formula::Zero(v.dim),
            Formula::Add(a, b) => Formula::add(a.grad(v, gradin.clone()), b.grad(v, gradin)),
            Formula::Sub(a, b) => Formula::sub(a.grad(v, gradin.clone()), b.grad(v, gradin)),
            Formula::Neg(a) => a.grad(v, Formula::neg(gradin)),
            Formula::Mul(a, b) => {
                let seed_a = contract_to(Formula::mul((**b).clone(), gradin.clone()), a.dim());
                let seed_b = contract_to(Formula::mul((**a).clone(), gradin), b.dim());
                Formula::add(a.grad(v, seed_a), b.grad(v, seed_b))
            }
            Formula::Square(a) => {
                let seed = Formula::mul(
                    Formula::IntCst(2),
                    Formula::mul((**a).clone(), gradin),
                );
                a.grad(v, seed)
            }
            Formula::Exp(a) => {
                let seed = Formula::mul(Formula::exp((**a).clone()), gradin);
                a.grad(v, seed)
            }
            Formula::SumElems(a) => a.grad(v, Formula::broadcast(gradin, a.dim())),
            Formula::Broadcast(a, _) => a.grad(v, Formula::sum_elems(gradin)),
            Formula::SqDist(a, b) => {
                let diff = Formula::sub((**a).clone(), (**b).clone());
                let seed = Formula::mul(Formula::IntCst(2), Formula::mul(gradin, diff));
                Formula::add(a.grad(v, seed.clone()), b.grad(v, Formula::neg(seed)))
            }
        }
    }
}

/// Reduces a seed to the width of the operand it feeds: a scalar operand of
/// a broadcast product receives the summed seed.
fn contract_to(seed: Formula, operand_dim: usize) -> Formula {
    if seed.dim() == operand_dim {
        seed
    } else {
        Formula::sum_elems(seed)
    }
}
