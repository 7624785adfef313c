//! Symbolic formulas evaluated pointwise over pairs of indices.
//!
//! A [`Formula`] is a typed, immutable expression tree over [`Var`] leaves.
//! Variables carry a category tag selecting which index set addresses them:
//! `x`-variables are rows of the `i` set, `y`-variables rows of the `j` set,
//! and parameters are independent of both. The tree is walked by a generic
//! interpreter (see [`Formula::eval_pair`]) and rewritten symbolically for
//! gradients (see [`Formula::grad`]).

mod eval;
mod grad;

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub use eval::EvalPoint;

/// Which index set addresses a variable's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarCategory {
    /// Indexed by `i`.
    I,
    /// Indexed by `j`.
    J,
    /// A parameter, independent of both index sets.
    Param,
}

/// A formula leaf: an argument-buffer slot together with its row width and
/// addressing category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Var {
    pub index: usize,
    pub dim: usize,
    pub category: VarCategory,
}

impl Var {
    pub fn new(index: usize, dim: usize, category: VarCategory) -> Self {
        Var {
            index,
            dim,
            category,
        }
    }

    /// An `i`-indexed variable, printed as `x{index}`.
    pub fn x(index: usize, dim: usize) -> Self {
        Var::new(index, dim, VarCategory::I)
    }

    /// A `j`-indexed variable, printed as `y{index}`.
    pub fn y(index: usize, dim: usize) -> Self {
        Var::new(index, dim, VarCategory::J)
    }

    /// A parameter variable, printed as `p{index}`.
    pub fn param(index: usize, dim: usize) -> Self {
        Var::new(index, dim, VarCategory::Param)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.category {
            VarCategory::I => "x",
            VarCategory::J => "y",
            VarCategory::Param => "p",
        };
        write!(f, "{tag}{}", self.index)
    }
}

/// Immutable expression tree over [`Var`] leaves.
///
/// Widths are runtime values; [`Formula::check`] validates the whole tree
/// before any evaluation. `Mul` is elementwise with scalar broadcast: one
/// operand may have width 1, in which case it multiplies every component of
/// the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    Var(Var),
    /// Constant zero vector of the given width.
    Zero(usize),
    /// Scalar integer constant, width 1.
    IntCst(i32),
    Add(Box<Formula>, Box<Formula>),
    Sub(Box<Formula>, Box<Formula>),
    Neg(Box<Formula>),
    Mul(Box<Formula>, Box<Formula>),
    Square(Box<Formula>),
    Exp(Box<Formula>),
    /// Sums a vector down to width 1.
    SumElems(Box<Formula>),
    /// Replicates a width-1 operand to the given width; the adjoint of
    /// [`Formula::SumElems`].
    Broadcast(Box<Formula>, usize),
    /// Squared euclidean distance between two equal-width operands, width 1.
    SqDist(Box<Formula>, Box<Formula>),
}

impl Formula {
    pub fn var(v: Var) -> Self {
        Formula::Var(v)
    }

    /// Elementwise sum; zero operands fold away.
    pub fn add(a: Formula, b: Formula) -> Formula {
        match (a, b) {
            (Formula::Zero(_), b) => b,
            (a, Formula::Zero(_)) => a,
            (a, b) => Formula::Add(Box::new(a), Box::new(b)),
        }
    }

    pub fn sub(a: Formula, b: Formula) -> Formula {
        match (a, b) {
            (a, Formula::Zero(_)) => a,
            (Formula::Zero(_), b) => Formula::neg(b),
            (a, b) => Formula::Sub(Box::new(a), Box::new(b)),
        }
    }

    pub fn neg(a: Formula) -> Formula {
        match a {
            Formula::Zero(n) => Formula::Zero(n),
            Formula::Neg(inner) => *inner,
            a => Formula::Neg(Box::new(a)),
        }
    }

    /// Elementwise product with scalar broadcast; multiplying by zero folds
    /// to a zero of the product width.
    pub fn mul(a: Formula, b: Formula) -> Formula {
        let width = a.dim().max(b.dim());
        match (a, b) {
            (Formula::Zero(_), _) | (_, Formula::Zero(_)) => Formula::Zero(width),
            (a, b) => Formula::Mul(Box::new(a), Box::new(b)),
        }
    }

    pub fn square(a: Formula) -> Formula {
        match a {
            Formula::Zero(n) => Formula::Zero(n),
            a => Formula::Square(Box::new(a)),
        }
    }

    pub fn exp(a: Formula) -> Formula {
        Formula::Exp(Box::new(a))
    }

    pub fn sum_elems(a: Formula) -> Formula {
        match a {
            Formula::Zero(_) => Formula::Zero(1),
            a => Formula::SumElems(Box::new(a)),
        }
    }

    pub fn broadcast(a: Formula, width: usize) -> Formula {
        match a {
            Formula::Zero(_) => Formula::Zero(width),
            a => Formula::Broadcast(Box::new(a), width),
        }
    }

    pub fn sq_dist(a: Formula, b: Formula) -> Formula {
        Formula::SqDist(Box::new(a), Box::new(b))
    }

    /// Output width of the formula.
    pub fn dim(&self) -> usize {
        match self {
            Formula::Var(v) => v.dim,
            Formula::Zero(n) => *n,
            Formula::IntCst(_) => 1,
            Formula::Add(a, _) | Formula::Sub(a, _) => a.dim(),
            Formula::Neg(a) | Formula::Square(a) | Formula::Exp(a) => a.dim(),
            Formula::Mul(a, b) => a.dim().max(b.dim()),
            Formula::SumElems(_) => 1,
            Formula::Broadcast(_, n) => *n,
            Formula::SqDist(_, _) => 1,
        }
    }

    /// Validates width agreement across the whole tree and the consistency
    /// of every argument slot.
    pub fn check(&self) -> EngineResult<()> {
        self.check_node()?;
        self.vars()?;
        Ok(())
    }

    fn check_node(&self) -> EngineResult<()> {
        match self {
            Formula::Var(v) => {
                if v.dim == 0 {
                    return Err(EngineError::formula(format!("variable {v} has width 0")));
                }
            }
            Formula::Zero(n) => {
                if *n == 0 {
                    return Err(EngineError::formula("zero constant has width 0"));
                }
            }
            Formula::IntCst(_) => {}
            Formula::Add(a, b) | Formula::Sub(a, b) => {
                a.check_node()?;
                b.check_node()?;
                if a.dim() != b.dim() {
                    return Err(EngineError::formula(format!(
                        "width mismatch in {self}: {} vs {}",
                        a.dim(),
                        b.dim()
                    )));
                }
            }
            Formula::Neg(a) | Formula::Square(a) | Formula::Exp(a) => a.check_node()?,
            Formula::Mul(a, b) => {
                a.check_node()?;
                b.check_node()?;
                let (da, db) = (a.dim(), b.dim());
                if da != db && da != 1 && db != 1 {
                    return Err(EngineError::formula(format!(
                        "width mismatch in {self}: {da} vs {db} (only scalar broadcast is allowed)"
                    )));
                }
            }
            Formula::SumElems(a) => a.check_node()?,
            Formula::Broadcast(a, n) => {
                a.check_node()?;
                if a.dim() != 1 {
                    return Err(EngineError::formula(format!(
                        "broadcast applied to width-{} operand in {self}",
                        a.dim()
                    )));
                }
                if *n == 0 {
                    return Err(EngineError::formula("broadcast to width 0"));
                }
            }
            Formula::SqDist(a, b) => {
                a.check_node()?;
                b.check_node()?;
                if a.dim() != b.dim() {
                    return Err(EngineError::formula(format!(
                        "width mismatch in {self}: {} vs {}",
                        a.dim(),
                        b.dim()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Deduplicated list of the formula's variables, rejecting two leaves
    /// that claim the same argument slot with different widths or categories.
    pub fn vars(&self) -> EngineResult<Vec<Var>> {
        let mut found: Vec<Var> = Vec::new();
        self.collect_vars(&mut found)?;
        found.sort_by_key(|v| v.index);
        Ok(found)
    }

    fn collect_vars(&self, found: &mut Vec<Var>) -> EngineResult<()> {
        match self {
            Formula::Var(v) => {
                if let Some(prev) = found.iter().find(|p| p.index == v.index) {
                    if prev != v {
                        return Err(EngineError::formula(format!(
                            "argument slot {} declared as both {prev:?} and {v:?}",
                            v.index
                        )));
                    }
                } else {
                    found.push(*v);
                }
            }
            Formula::Zero(_) | Formula::IntCst(_) => {}
            Formula::Add(a, b)
            | Formula::Sub(a, b)
            | Formula::Mul(a, b)
            | Formula::SqDist(a, b) => {
                a.collect_vars(found)?;
                b.collect_vars(found)?;
            }
            Formula::Neg(a)
            | Formula::Square(a)
            | Formula::Exp(a)
            | Formula::SumElems(a)
            | Formula::Broadcast(a, _) => a.collect_vars(found)?,
        }
        Ok(())
    }

    /// Number of argument slots the formula expects (highest slot index + 1).
    pub fn arg_slots(&self) -> EngineResult<usize> {
        Ok(self
            .vars()?
            .iter()
            .map(|v| v.index + 1)
            .max()
            .unwrap_or(0))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Var(v) => write!(f, "{v}"),
            Formula::Zero(n) => write!(f, "Zero({n})"),
            Formula::IntCst(c) => write!(f, "{c}"),
            Formula::Add(a, b) => write!(f, "({a} + {b})"),
            Formula::Sub(a, b) => write!(f, "({a} - {b})"),
            Formula::Neg(a) => write!(f, "-{a}"),
            Formula::Mul(a, b) => write!(f, "({a} * {b})"),
            Formula::Square(a) => write!(f, "Square({a})"),
            Formula::Exp(a) => write!(f, "Exp({a})"),
            Formula::SumElems(a) => write!(f, "Sum({a})"),
            Formula::Broadcast(a, n) => write!(f, "Bcast({a}, {n})"),
            Formula::SqDist(a, b) => write!(f, "SqDist({a}, {b})"),
        }
    }
}

impl Add for Formula {
    type Output = Formula;

    fn add(self, rhs: Formula) -> Formula {
        Formula::add(self, rhs)
    }
}

impl Sub for Formula {
    type Output = Formula;

    fn sub(self, rhs: Formula) -> Formula {
        Formula::sub(self, rhs)
    }
}

impl Mul for Formula {
    type Output = Formula;

    fn mul(self, rhs: Formula) -> Formula {
        Formula::mul(self, rhs)
    }
}

impl Neg for Formula {
    type Output = Formula;

    fn neg(self) -> Formula {
        Formula::neg(self)
    }
}

impl From<Var> for Formula {
    fn from(v: Var) -> Formula {
        Formula::Var(v)
    }
}
