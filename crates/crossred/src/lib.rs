//! Streaming pairwise map-reduce kernel engine.
//!
//! Given two index sets of sizes `nx` and `ny`, a symbolic [`Formula`] is
//! evaluated at every pair `(i, j)` and folded into one output row per outer
//! index through a pluggable [`Reduction`] operator, without ever
//! materializing the `nx * ny` intermediate. Gradients are obtained by
//! rewriting formulas symbolically, never by numeric differencing.
//!
//! The convolution drivers that stream pairs through the operators live in
//! the companion `crossred-backend-cpu` crate.

pub mod element;
pub mod error;
pub mod formula;
pub mod ranges;
pub mod reduction;
pub mod shape;

pub use element::Element;
pub use error::{EngineError, EngineResult};
pub use formula::{Formula, Var, VarCategory};
pub use ranges::{IndexRange, RangeTable};
pub use reduction::{ArgKMin, Gradient, MinArgMin, ReduceAxis, Reduction, SumReduction};
pub use shape::ShapeTable;
