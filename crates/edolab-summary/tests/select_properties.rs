use edolab_summary::{select, SummaryRow, SummaryTable};
use proptest::prelude::*;

fn table(fitness: &[f64]) -> SummaryTable {
    SummaryTable::from_rows(
        fitness
            .iter()
            .enumerate()
            .map(|(idx, fitness)| SummaryRow {
                individual: idx as u64,
                nrows: 1,
                ncols: 1,
                memory: 136,
                generation: 0,
                fitness: *fitness,
                seed: 0,
            })
            .collect(),
    )
}

proptest! {
    #[test]
    fn selected_fitness_is_monotone(
        fitness in prop::collection::vec(-1.0e6f64..1.0e6, 1..64),
        quantiles in prop::collection::vec(0.0f64..=1.0, 1..12),
    ) {
        let table = table(&fitness);
        let index = select(&table, &quantiles).expect("select");
        let picked: Vec<f64> = index
            .values()
            .map(|row| table.row(*row).expect("row").fitness)
            .collect();
        prop_assert!(picked.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn extremes_are_min_and_max(fitness in prop::collection::vec(-1.0e6f64..1.0e6, 1..64)) {
        let table = table(&fitness);
        let index = select(&table, &[0.0, 1.0]).expect("select");
        let min = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let max = fitness.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut picked = index.values().map(|row| table.row(*row).expect("row").fitness);
        prop_assert_eq!(picked.next(), Some(min));
        prop_assert_eq!(picked.next(), Some(max));
    }

    #[test]
    fn selection_is_deterministic(
        fitness in prop::collection::vec(-10.0f64..10.0, 1..32),
        quantiles in prop::collection::vec(0.0f64..=1.0, 1..8),
    ) {
        let table = table(&fitness);
        prop_assert_eq!(
            select(&table, &quantiles).expect("first"),
            select(&table, &quantiles).expect("second")
        );
    }
}
