//! Ranged / block-sparse convolution driver with batch broadcasting.
//!
//! Skips tiles known a priori to contribute nothing and broadcasts the same
//! formula over extra batch dimensions. The abstract outer and inner index
//! spaces are the per-batch row counts concatenated over batch elements;
//! tiles never straddle a batch boundary, and selection indices reported by
//! argmin-family reductions are batch-local.

use smallvec::{smallvec, SmallVec};

use crossred::formula::EvalPoint;
use crossred::{
    Element, EngineError, EngineResult, RangeTable, Reduction, ShapeTable, VarCategory,
};

/// Block-sparse driver. Output rows covered by an outer tile are written
/// exactly once; rows outside every outer tile are left untouched — the
/// range list defines which rows are produced. An outer index whose tile
/// owns zero inner ranges still passes `init -> finalize`, so it receives
/// the operator's identity output.
pub struct CpuConvRanges;

impl CpuConvRanges {
    pub fn run<T, R>(
        red: &R,
        nx: usize,
        ny: usize,
        shapes: &ShapeTable,
        ranges: &RangeTable,
        gamma: &mut [T],
        args: &[&[T]],
    ) -> EngineResult<()>
    where
        T: Element,
        R: Reduction<T> + ?Sized,
    {
        let formula = red.formula();
        formula.check()?;
        let slots = formula.arg_slots()?;
        if args.len() != slots {
            return Err(EngineError::contract(format!(
                "formula {formula} expects {slots} argument buffers, {} provided",
                args.len()
            )));
        }
        if shapes.nargs() != slots {
            return Err(EngineError::contract(format!(
                "shape table describes {} arguments, formula expects {slots}",
                shapes.nargs()
            )));
        }

        let vars = formula.vars()?;
        for v in &vars {
            let [m, n, d] = shapes.arg_row(v.index)?;
            let row_ok = match v.category {
                VarCategory::I => m == nx && n == 1,
                VarCategory::J => m == 1 && n == ny,
                VarCategory::Param => m == 1 && n == 1,
            };
            if !row_ok {
                return Err(EngineError::contract(format!(
                    "shape row of variable {v} is [{m}, {n}], inconsistent with nx={nx}, ny={ny}"
                )));
            }
            if d != v.dim {
                return Err(EngineError::contract(format!(
                    "shape row of variable {v} carries width {d}, formula declares {}",
                    v.dim
                )));
            }
            let expected = shapes.arg_rows_total(v.index)? * v.dim;
            if args[v.index].len() != expected {
                return Err(EngineError::contract(format!(
                    "buffer for variable {v} has length {}, expected {expected}",
                    args[v.index].len()
                )));
            }
        }

        let [m_out, n_out, d_out] = shapes.out_row();
        if m_out != nx || n_out != ny {
            return Err(EngineError::contract(format!(
                "output shape row is [{m_out}, {n_out}], expected [{nx}, {ny}]"
            )));
        }
        if d_out != red.dim() {
            return Err(EngineError::contract(format!(
                "output shape row carries width {d_out}, reduction produces {}",
                red.dim()
            )));
        }
        if red.dim() == 0 || red.dim_red() == 0 {
            return Err(EngineError::contract("reduction has zero output width"));
        }

        let axis = red.axis();
        let batch = shapes.batch_size();
        let outer_rows = axis.outer_count(nx, ny);
        let inner_rows = axis.inner_count(nx, ny);
        let dim = red.dim();
        if gamma.len() != batch * outer_rows * dim {
            return Err(EngineError::contract(format!(
                "output buffer has length {}, expected {}",
                gamma.len(),
                batch * outer_rows * dim
            )));
        }

        ranges.validate(batch * outer_rows, batch * inner_rows)?;
        validate_batch_alignment(ranges, shapes.nbatchdims(), outer_rows, inner_rows)?;

        let mut offsets = vec![0usize; slots];
        let mut acc: SmallVec<[T; 16]> = smallvec![T::zero(); red.dim_red()];
        let mut fout: SmallVec<[T; 8]> = smallvec![T::zero(); formula.dim()];

        for (r, tile) in ranges.outer_ranges().iter().enumerate() {
            if tile.is_empty() {
                continue;
            }
            let b = tile.begin / outer_rows;
            for v in &vars {
                offsets[v.index] = shapes.batch_offset(v.index, b)?;
            }
            let inner_tiles = ranges.inner_slice(r);
            for g in tile.begin..tile.end {
                let outer_local = g - b * outer_rows;
                red.init(&mut acc);
                for span in inner_tiles {
                    for h in span.begin..span.end {
                        let inner_local = h - b * inner_rows;
                        let (i, j) = axis.pair(outer_local, inner_local);
                        formula.eval_at(
                            &EvalPoint {
                                i,
                                j,
                                args,
                                offsets: &offsets,
                            },
                            &mut fout,
                        )?;
                        red.fold(&mut acc, &fout, inner_local);
                    }
                }
                red.finalize(&acc, &mut gamma[g * dim..(g + 1) * dim], args, outer_local);
            }
        }
        Ok(())
    }
}

/// With batch dims present, every tile must live inside one batch element,
/// and each outer tile's inner ranges must address the same element.
fn validate_batch_alignment(
    ranges: &RangeTable,
    nbatchdims: usize,
    outer_rows: usize,
    inner_rows: usize,
) -> EngineResult<()> {
    if nbatchdims == 0 {
        return Ok(());
    }
    for (r, tile) in ranges.outer_ranges().iter().enumerate() {
        if tile.is_empty() {
            continue;
        }
        let b = tile.begin / outer_rows;
        if (tile.end - 1) / outer_rows != b {
            return Err(EngineError::contract(format!(
                "outer tile [{}, {}) straddles a batch boundary",
                tile.begin, tile.end
            )));
        }
        for span in ranges.inner_slice(r) {
            if span.is_empty() {
                continue;
            }
            if span.begin / inner_rows != b || (span.end - 1) / inner_rows != b {
                return Err(EngineError::contract(format!(
                    "inner range [{}, {}) does not stay inside batch element {b}",
                    span.begin, span.end
                )));
            }
        }
    }
    Ok(())
}
