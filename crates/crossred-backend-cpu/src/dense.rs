//! Dense convolution driver: the full cross product, one bounded
//! accumulator per output row.

use std::ops::Range;

use rayon::prelude::*;
use smallvec::{smallvec, SmallVec};

use crossred::{Element, EngineError, EngineResult, Reduction};

use crate::validate::validate_dense;

type Acc<T> = SmallVec<[T; 16]>;
type Fout<T> = SmallVec<[T; 8]>;

/// Streams `O(nx * ny)` formula evaluations through one accumulator per
/// outer index. Outer iterations are independent; no accumulator state
/// crosses output rows.
pub struct CpuConv;

impl CpuConv {
    /// Serial driver. `gamma` must hold `N_outer * dim` elements and is
    /// written exactly once per output row.
    pub fn run<T, R>(
        red: &R,
        nx: usize,
        ny: usize,
        gamma: &mut [T],
        args: &[&[T]],
    ) -> EngineResult<()>
    where
        T: Element,
        R: Reduction<T> + ?Sized,
    {
        validate_dense(red, nx, ny, gamma, args)?;
        let inner_count = red.axis().inner_count(nx, ny);
        for (outer, row) in gamma.chunks_mut(red.dim()).enumerate() {
            reduce_row(red, outer, inner_count, args, row)?;
        }
        Ok(())
    }

    /// Same contract as [`CpuConv::run`], with output rows partitioned
    /// across rayon workers. Rows are disjoint and inputs are shared
    /// read-only, so the partitioning needs no synchronization.
    pub fn run_parallel<T, R>(
        red: &R,
        nx: usize,
        ny: usize,
        gamma: &mut [T],
        args: &[&[T]],
    ) -> EngineResult<()>
    where
        T: Element,
        R: Reduction<T> + ?Sized,
    {
        validate_dense(red, nx, ny, gamma, args)?;
        let inner_count = red.axis().inner_count(nx, ny);
        gamma
            .par_chunks_mut(red.dim())
            .enumerate()
            .try_for_each(|(outer, row)| reduce_row(red, outer, inner_count, args, row))
    }

    /// Same result as [`CpuConv::run`], computed by folding `chunk`-sized
    /// spans of the inner index set into partial accumulators and merging
    /// them in ascending span order. This is the combination discipline
    /// partial results from independent workers must follow so selection
    /// ties stay deterministic.
    pub fn run_chunked<T, R>(
        red: &R,
        nx: usize,
        ny: usize,
        chunk: usize,
        gamma: &mut [T],
        args: &[&[T]],
    ) -> EngineResult<()>
    where
        T: Element,
        R: Reduction<T> + ?Sized,
    {
        if chunk == 0 {
            return Err(EngineError::contract("chunk size must be nonzero"));
        }
        validate_dense(red, nx, ny, gamma, args)?;
        let inner_count = red.axis().inner_count(nx, ny);
        for (outer, row) in gamma.chunks_mut(red.dim()).enumerate() {
            let mut acc: Acc<T> = smallvec![T::zero(); red.dim_red()];
            let mut partial: Acc<T> = smallvec![T::zero(); red.dim_red()];
            let mut fout: Fout<T> = smallvec![T::zero(); red.formula().dim()];
            red.init(&mut acc);
            let mut begin = 0;
            while begin < inner_count {
                let end = (begin + chunk).min(inner_count);
                red.init(&mut partial);
                fold_span(red, outer, begin..end, args, &mut partial, &mut fout)?;
                red.merge(&mut acc, &partial);
                begin = end;
            }
            red.finalize(&acc, row, args, outer);
        }
        Ok(())
    }
}

fn reduce_row<T, R>(
    red: &R,
    outer: usize,
    inner_count: usize,
    args: &[&[T]],
    out: &mut [T],
) -> EngineResult<()>
where
    T: Element,
    R: Reduction<T> + ?Sized,
{
    let mut acc: Acc<T> = smallvec![T::zero(); red.dim_red()];
    let mut fout: Fout<T> = smallvec![T::zero(); red.formula().dim()];
    red.init(&mut acc);
    fold_span(red, outer, 0..inner_count, args, &mut acc, &mut fout)?;
    red.finalize(&acc, out, args, outer);
    Ok(())
}

fn fold_span<T, R>(
    red: &R,
    outer: usize,
    span: Range<usize>,
    args: &[&[T]],
    acc: &mut [T],
    fout: &mut [T],
) -> EngineResult<()>
where
    T: Element,
    R: Reduction<T> + ?Sized,
{
    for inner in span {
        let (i, j) = red.axis().pair(outer, inner);
        red.formula().eval_pair(i, j, args, fout)?;
        red.fold(acc, fout, inner);
    }
    Ok(())
}
