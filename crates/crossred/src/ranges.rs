//! Block-sparse range descriptors for the ranged convolution driver.
//!
//! A [`RangeTable`] lists which tiles of the `(outer, inner)` index product
//! participate in a reduction: an ordered sequence of outer tiles, each
//! owning a slice of inner reduction ranges. Outer tiles must be pairwise
//! disjoint (each output row is produced by exactly one tile); inner ranges
//! of one tile must be pairwise disjoint but may appear in any order — the
//! reduction operators' tie policies are index-based, not visit-order-based.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Half-open index interval `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub begin: usize,
    pub end: usize,
}

impl IndexRange {
    pub fn new(begin: usize, end: usize) -> EngineResult<Self> {
        if begin > end {
            return Err(EngineError::contract(format!(
                "index range [{begin}, {end}) has begin > end"
            )));
        }
        Ok(IndexRange { begin, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// Tile list for one block-sparse reduction.
///
/// `slices` holds cumulative ends into `inner`: outer tile `r` owns the
/// inner ranges `inner[slices[r-1]..slices[r]]` (with `slices[-1]` read as
/// zero). An outer tile whose slice is empty still produces output rows —
/// the operator identity passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeTable {
    outer: Vec<IndexRange>,
    slices: Vec<usize>,
    inner: Vec<IndexRange>,
}

impl RangeTable {
    pub fn new(
        outer: Vec<IndexRange>,
        slices: Vec<usize>,
        inner: Vec<IndexRange>,
    ) -> EngineResult<Self> {
        if slices.len() != outer.len() {
            return Err(EngineError::contract(format!(
                "range table has {} outer tiles but {} slice ends",
                outer.len(),
                slices.len()
            )));
        }
        let mut prev = 0usize;
        for (r, &end) in slices.iter().enumerate() {
            if end < prev {
                return Err(EngineError::contract(format!(
                    "slice ends must be non-decreasing: slices[{r}] = {end} after {prev}"
                )));
            }
            prev = end;
        }
        if prev != inner.len() {
            return Err(EngineError::contract(format!(
                "slice ends cover {prev} inner ranges but {} were provided",
                inner.len()
            )));
        }
        Ok(RangeTable {
            outer,
            slices,
            inner,
        })
    }

    /// Single-tile table covering the full dense `[0, n_outer) x [0, n_inner)`
    /// product.
    pub fn dense(n_outer: usize, n_inner: usize) -> Self {
        RangeTable {
            outer: vec![IndexRange {
                begin: 0,
                end: n_outer,
            }],
            slices: vec![1],
            inner: vec![IndexRange {
                begin: 0,
                end: n_inner,
            }],
        }
    }

    pub fn n_outer_ranges(&self) -> usize {
        self.outer.len()
    }

    pub fn n_inner_ranges(&self) -> usize {
        self.inner.len()
    }

    pub fn outer_ranges(&self) -> &[IndexRange] {
        &self.outer
    }

    /// Inner reduction ranges owned by outer tile `r`.
    pub fn inner_slice(&self, r: usize) -> &[IndexRange] {
        let start = if r == 0 { 0 } else { self.slices[r - 1] };
        &self.inner[start..self.slices[r]]
    }

    /// Bounds-checks every tile against the abstract index space sizes and
    /// rejects overlapping tiles.
    pub fn validate(&self, n_outer: usize, n_inner: usize) -> EngineResult<()> {
        for tile in &self.outer {
            if tile.begin > tile.end || tile.end > n_outer {
                return Err(EngineError::contract(format!(
                    "outer tile [{}, {}) exceeds outer index space of size {n_outer}",
                    tile.begin, tile.end
                )));
            }
        }
        for tile in &self.inner {
            if tile.begin > tile.end || tile.end > n_inner {
                return Err(EngineError::contract(format!(
                    "inner tile [{}, {}) exceeds inner index space of size {n_inner}",
                    tile.begin, tile.end
                )));
            }
        }
        check_disjoint(&self.outer, "outer tiles")?;
        for r in 0..self.outer.len() {
            check_disjoint(self.inner_slice(r), "inner ranges of one outer tile")?;
        }
        Ok(())
    }
}

fn check_disjoint(ranges: &[IndexRange], what: &str) -> EngineResult<()> {
    let mut sorted: Vec<IndexRange> = ranges.iter().filter(|r| !r.is_empty()).copied().collect();
    sorted.sort_by_key(|r| r.begin);
    for pair in sorted.windows(2) {
        if pair[1].begin < pair[0].end {
            return Err(EngineError::contract(format!(
                "{what} overlap: [{}, {}) and [{}, {})",
                pair[0].begin, pair[0].end, pair[1].begin, pair[1].end
            )));
        }
    }
    Ok(())
}
