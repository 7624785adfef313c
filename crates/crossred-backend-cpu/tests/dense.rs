use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crossred::{ArgKMin, EngineError, Formula, MinArgMin, ReduceAxis, SumReduction, Var};
use crossred_backend_cpu::CpuConv;

/// A 3x4 table of pairwise values, realized as `Sum(x0 * y1)` with `x0`
/// holding the table rows and `y1` one-hot columns.
const TABLE: [[f32; 4]; 3] = [
    [3.0, 1.0, 4.0, 1.0],
    [5.0, 9.0, 2.0, 6.0],
    [5.0, 3.0, 5.0, 8.0],
];

fn table_formula() -> Formula {
    Formula::sum_elems(Formula::mul(
        Formula::var(Var::x(0, 4)),
        Formula::var(Var::y(1, 4)),
    ))
}

fn table_args() -> (Vec<f32>, Vec<f32>) {
    let rows: Vec<f32> = TABLE.iter().flatten().copied().collect();
    let mut one_hot = vec![0.0f32; 16];
    for j in 0..4 {
        one_hot[j * 4 + j] = 1.0;
    }
    (rows, one_hot)
}

#[test]
fn sum_reduction_produces_row_sums() -> Result<()> {
    let red = SumReduction::new(table_formula(), ReduceAxis::OverJ);
    let (rows, one_hot) = table_args();
    let mut gamma = vec![0.0f32; 3];
    CpuConv::run(&red, 3, 4, &mut gamma, &[&rows, &one_hot])?;
    assert_eq!(gamma, vec![9.0, 22.0, 21.0]);
    Ok(())
}

#[test]
fn sum_reduction_over_i_produces_column_sums() -> Result<()> {
    let red = SumReduction::new(table_formula(), ReduceAxis::OverI);
    let (rows, one_hot) = table_args();
    let mut gamma = vec![0.0f32; 4];
    CpuConv::run(&red, 3, 4, &mut gamma, &[&rows, &one_hot])?;
    assert_eq!(gamma, vec![13.0, 13.0, 11.0, 15.0]);
    Ok(())
}

#[test]
fn min_argmin_reports_first_minimal_index_per_row() -> Result<()> {
    let red = MinArgMin::new(table_formula(), ReduceAxis::OverJ);
    let (rows, one_hot) = table_args();
    let mut gamma = vec![0.0f32; 6];
    CpuConv::run(&red, 3, 4, &mut gamma, &[&rows, &one_hot])?;
    // Row 0 holds its minimum twice (columns 1 and 3); the first wins.
    assert_eq!(gamma, vec![1.0, 1.0, 2.0, 2.0, 3.0, 1.0]);
    Ok(())
}

#[test]
fn empty_inner_set_passes_the_identity_through() -> Result<()> {
    let sum = SumReduction::new(table_formula(), ReduceAxis::OverJ);
    let (rows, _) = table_args();
    let empty: Vec<f32> = Vec::new();
    let mut gamma = vec![42.0f32; 3];
    CpuConv::run(&sum, 3, 0, &mut gamma, &[&rows, &empty])?;
    assert_eq!(gamma, vec![0.0, 0.0, 0.0]);

    let min = MinArgMin::new(table_formula(), ReduceAxis::OverJ);
    let mut gamma = vec![42.0f32; 6];
    CpuConv::run(&min, 3, 0, &mut gamma, &[&rows, &empty])?;
    for row in gamma.chunks(2) {
        assert_eq!(row[0], f32::INFINITY);
        assert_eq!(row[1], 0.0);
    }
    Ok(())
}

#[test]
fn argkmin_matches_a_sort_oracle_per_component() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let (nx, ny, width, k) = (5usize, 40usize, 2usize, 3usize);
    let xs: Vec<f32> = (0..nx).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let ys: Vec<f32> = (0..ny * width).map(|_| rng.gen_range(-1.0..1.0)).collect();

    // Per-pair value: x0_i * y1_j, componentwise over y's width.
    let formula = Formula::mul(Formula::var(Var::x(0, 1)), Formula::var(Var::y(1, width)));
    let red = ArgKMin::new(formula, k, ReduceAxis::OverJ)?;
    let mut gamma = vec![0.0f32; nx * k * width];
    CpuConv::run(&red, nx, ny, &mut gamma, &[&xs, &ys])?;

    for i in 0..nx {
        for comp in 0..width {
            let mut ranked: Vec<(f32, usize)> = (0..ny)
                .map(|j| (xs[i] * ys[j * width + comp], j))
                .collect();
            ranked.sort_by(|a, b| a.partial_cmp(b).unwrap());
            for s in 0..k {
                let reported = gamma[i * k * width + s * width + comp] as usize;
                assert_eq!(reported, ranked[s].1, "row {i}, component {comp}, rank {s}");
            }
        }
    }
    Ok(())
}

#[test]
fn parallel_driver_matches_the_serial_one() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let (nx, ny, width) = (17usize, 23usize, 3usize);
    let xs: Vec<f32> = (0..nx * width).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let ys: Vec<f32> = (0..ny * width).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let formula = Formula::exp(Formula::neg(Formula::sq_dist(
        Formula::var(Var::x(0, width)),
        Formula::var(Var::y(1, width)),
    )));
    let red = SumReduction::new(formula, ReduceAxis::OverJ);

    let mut serial = vec![0.0f32; nx];
    let mut parallel = vec![0.0f32; nx];
    CpuConv::run(&red, nx, ny, &mut serial, &[&xs, &ys])?;
    CpuConv::run_parallel(&red, nx, ny, &mut parallel, &[&xs, &ys])?;
    assert_eq!(serial, parallel);
    Ok(())
}

#[test]
fn chunked_merge_matches_a_single_pass_for_any_chunk_size() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(99);
    let (nx, ny) = (4usize, 31usize);
    let xs: Vec<f32> = (0..nx).map(|_| rng.gen_range(0.5..2.0)).collect();
    let ys: Vec<f32> = (0..ny).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let formula = Formula::mul(Formula::var(Var::x(0, 1)), Formula::var(Var::y(1, 1)));
    let arg_min = ArgKMin::new(formula.clone(), 4, ReduceAxis::OverJ)?;
    let sum = SumReduction::new(formula, ReduceAxis::OverJ);

    let mut baseline_min = vec![0.0f32; nx * 4];
    let mut baseline_sum = vec![0.0f32; nx];
    CpuConv::run(&arg_min, nx, ny, &mut baseline_min, &[&xs, &ys])?;
    CpuConv::run(&sum, nx, ny, &mut baseline_sum, &[&xs, &ys])?;

    for chunk in [1usize, 2, 5, 31, 100] {
        let mut gamma = vec![0.0f32; nx * 4];
        CpuConv::run_chunked(&arg_min, nx, ny, chunk, &mut gamma, &[&xs, &ys])?;
        assert_eq!(gamma, baseline_min, "selection diverged at chunk {chunk}");

        let mut gamma = vec![0.0f32; nx];
        CpuConv::run_chunked(&sum, nx, ny, chunk, &mut gamma, &[&xs, &ys])?;
        for (got, want) in gamma.iter().zip(baseline_sum.iter()) {
            assert!((got - want).abs() < 1e-4, "sum diverged at chunk {chunk}");
        }
    }
    Ok(())
}

#[test]
fn mismatched_buffers_fail_fast() {
    let red = SumReduction::new(table_formula(), ReduceAxis::OverJ);
    let (rows, one_hot) = table_args();

    let mut short_gamma = vec![0.0f32; 2];
    let err = CpuConv::run(&red, 3, 4, &mut short_gamma, &[&rows, &one_hot]).unwrap_err();
    assert!(matches!(err, EngineError::Contract { .. }));

    let mut gamma = vec![0.0f32; 3];
    let truncated = &rows[..8];
    let err = CpuConv::run(&red, 3, 4, &mut gamma, &[truncated, &one_hot]).unwrap_err();
    assert!(matches!(err, EngineError::Contract { .. }));
}
