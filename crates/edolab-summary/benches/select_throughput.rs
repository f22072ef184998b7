use criterion::{black_box, criterion_group, criterion_main, Criterion};
use edolab_core::RngHandle;
use rand::Rng;

use edolab_summary::{select, SummaryRow, SummaryTable};

fn sample_table(rows: usize) -> SummaryTable {
    let mut rng = RngHandle::from_seed(11);
    SummaryTable::from_rows(
        (0..rows)
            .map(|idx| SummaryRow {
                individual: (idx % 100) as u64,
                nrows: rng.gen_range(1..50),
                ncols: rng.gen_range(1..10),
                memory: 128,
                generation: (idx / 100) as u64,
                fitness: rng.gen_range(-100.0..100.0),
                seed: 0,
            })
            .collect(),
    )
}

fn bench_select(c: &mut Criterion) {
    let table = sample_table(100_000);
    let quantiles: Vec<f64> = (0..=20).map(|step| step as f64 / 20.0).collect();
    c.bench_function("select_100k_rows_21_quantiles", |b| {
        b.iter(|| {
            let index = select(black_box(&table), black_box(&quantiles)).expect("select");
            black_box(index);
        })
    });
}

criterion_group!(benches, bench_select);
criterion_main!(benches);
