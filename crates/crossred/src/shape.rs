//! Batch shape metadata and broadcast offset resolution.
//!
//! The ranged driver supports extra batch dimensions broadcast over the same
//! formula. A [`ShapeTable`] holds one row per tensor — the output first,
//! then each argument buffer in slot order — with `nbatchdims + 3` entries
//! per row:
//!
//! ```text
//! [ B0, .., Bk, M, N, D ]   output:        M = nx, N = ny, D = output width
//! [ B0, .., Bk, M, 1, D ]   i-variable
//! [ B0, .., Bk, 1, N, D ]   j-variable
//! [ B0, .., Bk, 1, 1, D ]   parameter
//! ```
//!
//! A batch entry of 1 in an argument row where the output row carries a
//! larger size marks a broadcast input: that dimension contributes zero
//! stride, so every batch element reads the same rows.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeTable {
    nbatchdims: usize,
    rows: Vec<Vec<usize>>,
}

impl ShapeTable {
    /// Builds a table from raw rows, validating row lengths and broadcast
    /// consistency against the output row.
    pub fn new(nbatchdims: usize, rows: Vec<Vec<usize>>) -> EngineResult<Self> {
        if rows.is_empty() {
            return Err(EngineError::contract(
                "shape table needs at least the output row",
            ));
        }
        let width = nbatchdims + 3;
        for (r, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(EngineError::contract(format!(
                    "shape table row {r} has {} entries, expected {width}",
                    row.len()
                )));
            }
        }
        let table = ShapeTable { nbatchdims, rows };
        let out_batch = table.batch_dims().to_vec();
        for (a, row) in table.rows.iter().enumerate().skip(1) {
            for (d, (&arg, &out)) in row[..nbatchdims].iter().zip(out_batch.iter()).enumerate() {
                if arg != out && arg != 1 {
                    return Err(EngineError::contract(format!(
                        "argument {} batch dim {d} is {arg}, expected {out} or 1 (broadcast)",
                        a - 1
                    )));
                }
            }
        }
        Ok(table)
    }

    /// Table for an unbatched call: no batch dims, one row per tensor.
    pub fn unbatched(nx: usize, ny: usize, out_dim: usize, arg_dims: Vec<[usize; 3]>) -> Self {
        let mut rows = vec![vec![nx, ny, out_dim]];
        rows.extend(arg_dims.into_iter().map(|row| row.to_vec()));
        ShapeTable { nbatchdims: 0, rows }
    }

    pub fn nbatchdims(&self) -> usize {
        self.nbatchdims
    }

    /// Number of argument rows (the output row is not counted).
    pub fn nargs(&self) -> usize {
        self.rows.len() - 1
    }

    /// Batch dimensions of the output row.
    pub fn batch_dims(&self) -> &[usize] {
        &self.rows[0][..self.nbatchdims]
    }

    /// Total number of batch elements.
    pub fn batch_size(&self) -> usize {
        self.batch_dims().iter().product()
    }

    /// `[M, N, D]` entries of argument `a`'s row.
    pub fn arg_row(&self, a: usize) -> EngineResult<[usize; 3]> {
        let row = self.rows.get(a + 1).ok_or_else(|| {
            EngineError::contract(format!(
                "shape table has {} argument rows, argument {a} requested",
                self.nargs()
            ))
        })?;
        Ok([
            row[self.nbatchdims],
            row[self.nbatchdims + 1],
            row[self.nbatchdims + 2],
        ])
    }

    /// `[M, N, D]` of the output row.
    pub fn out_row(&self) -> [usize; 3] {
        let row = &self.rows[0];
        [
            row[self.nbatchdims],
            row[self.nbatchdims + 1],
            row[self.nbatchdims + 2],
        ]
    }

    /// Total rows of argument `a`'s buffer: its own batch extent times `M * N`.
    pub fn arg_rows_total(&self, a: usize) -> EngineResult<usize> {
        let [m, n, _] = self.arg_row(a)?;
        let batch: usize = self.rows[a + 1][..self.nbatchdims].iter().product();
        Ok(batch * m * n)
    }

    /// Deterministic row offset of argument `a` for one batch element.
    ///
    /// The linear `batch` index is unraveled row-major over the output batch
    /// dims; broadcast dims of the argument contribute zero stride.
    pub fn batch_offset(&self, a: usize, batch: usize) -> EngineResult<usize> {
        let arg_row = self
            .rows
            .get(a + 1)
            .ok_or_else(|| {
                EngineError::contract(format!(
                    "shape table has {} argument rows, argument {a} requested",
                    self.nargs()
                ))
            })?
            .clone();
        let [m, n, _] = self.arg_row(a)?;
        let rows_per_batch = m * n;
        let out_batch = self.batch_dims();

        let mut offset = 0usize;
        let mut rem = batch;
        // Row-major unravel: leftmost dim varies slowest.
        for d in 0..self.nbatchdims {
            let trailing: usize = out_batch[d + 1..].iter().product();
            let idx = rem / trailing;
            rem %= trailing;
            if arg_row[d] != 1 {
                let arg_trailing: usize = arg_row[d + 1..self.nbatchdims].iter().product();
                offset += idx * arg_trailing * rows_per_batch;
            }
        }
        Ok(offset)
    }
}
