//! Representative selection at fitness quantiles.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use edolab_core::errors::{ErrorInfo, LabError};
use serde::{Deserialize, Serialize};

use crate::summary::SummaryTable;

/// A validated quantile in `[0, 1]`.
///
/// Displays in its shortest form (`0`, `0.25`, `1`), which is also the name
/// of the output directory for the quantile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Quantile(f64);

impl Quantile {
    /// Validates `value` as a quantile.
    pub fn new(value: f64) -> Result<Self, LabError> {
        if (0.0..=1.0).contains(&value) {
            // Normalise -0.0 so it names the same directory as 0.
            Ok(Self(value + 0.0))
        } else {
            Err(LabError::InvalidQuantile(
                ErrorInfo::new("quantile-range", "quantiles must lie in [0, 1]")
                    .with_context("quantile", value.to_string()),
            ))
        }
    }

    /// Raw value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Nearest rank among `n` sorted rows, clamped to `[0, n - 1]`.
    pub fn rank(self, n: usize) -> usize {
        let last = n.saturating_sub(1);
        let rank = (self.0 * last as f64).round();
        (rank.max(0.0) as usize).min(last)
    }
}

impl TryFrom<f64> for Quantile {
    type Error = LabError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantile> for f64 {
    fn from(quantile: Quantile) -> Self {
        quantile.0
    }
}

impl PartialEq for Quantile {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Quantile {}

impl PartialOrd for Quantile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Quantile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates raw quantile values.
pub fn parse_quantiles(values: &[f64]) -> Result<Vec<Quantile>, LabError> {
    values.iter().map(|value| Quantile::new(*value)).collect()
}

/// Selected row index per quantile, ordered by quantile.
pub type RepresentativeIndex = BTreeMap<Quantile, usize>;

/// Selects one row per quantile by nearest rank over fitness.
///
/// Row indices are stably sorted by ascending fitness. When the row at the
/// target rank is tied with others, the tied row with the lowest index wins. NaN fitness
/// sorts after every number. Quantile `0` picks the minimum, `1` the maximum,
/// and the selected fitness never decreases as the quantile grows.
pub fn select(
    table: &SummaryTable,
    quantiles: &[f64],
) -> Result<RepresentativeIndex, LabError> {
    let quantiles = parse_quantiles(quantiles)?;
    if table.is_empty() {
        return Err(LabError::EmptyTable(ErrorInfo::new(
            "summary-empty",
            "cannot select representatives from an empty summary",
        )));
    }
    let rows = table.rows();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|a, b| rows[*a].fitness.total_cmp(&rows[*b].fitness));
    Ok(quantiles
        .into_iter()
        .map(|quantile| {
            // Step back to the first sorted row tied with the boundary.
            let mut rank = quantile.rank(order.len());
            let boundary = rows[order[rank]].fitness;
            while rank > 0 && rows[order[rank - 1]].fitness.total_cmp(&boundary).is_eq() {
                rank -= 1;
            }
            (quantile, order[rank])
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryRow;

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

    #[test]
    fn extremes_pick_min_and_max() {
        let idxs = select(&table(&[0.4, -2.0, 3.5, 1.0]), &[0.0, 1.0]).expect("select");
        assert_eq!(idxs[&Quantile::new(0.0).unwrap()], 1);
        assert_eq!(idxs[&Quantile::new(1.0).unwrap()], 2);
    }

    #[test]
    fn nearest_rank_rounds_half_away_from_zero() {
        // Sorted ranks 0..=4; 0.25 * 4 = 1, 0.375 * 4 = 1.5 -> 2.
        let idxs = select(&table(&[10.0, 0.0, 30.0, 20.0, 40.0]), &[0.25, 0.375]).expect("select");
        assert_eq!(idxs[&Quantile::new(0.25).unwrap()], 0);
        assert_eq!(idxs[&Quantile::new(0.375).unwrap()], 3);
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let idxs = select(&table(&[1.0, 0.5, 0.5, 0.5]), &[0.0, 0.5]).expect("select");
        assert_eq!(idxs[&Quantile::new(0.0).unwrap()], 1);
        // Sorted rows: [1, 2, 3, 0]; 0.5 * 3 = 1.5 -> rank 2, tied back to row 1.
        assert_eq!(idxs[&Quantile::new(0.5).unwrap()], 1);
    }

    #[test]
    fn tied_maximum_resolves_to_first_row() {
        let idxs = select(&table(&[2.0, 0.0, 2.0, 1.0, 2.0]), &[0.75, 1.0]).expect("select");
        assert_eq!(idxs[&Quantile::new(0.75).unwrap()], 0);
        assert_eq!(idxs[&Quantile::new(1.0).unwrap()], 0);
    }

    #[test]
    fn single_row_table_selects_it_everywhere() {
        let idxs = select(&table(&[7.0]), &[0.0, 0.3, 1.0]).expect("select");
        assert!(idxs.values().all(|idx| *idx == 0));
        assert_eq!(idxs.len(), 3);
    }

    #[test]
    fn empty_table_rejected() {
        let err = select(&SummaryTable::default(), &[0.5]).expect_err("empty");
        assert!(matches!(err, LabError::EmptyTable(_)));
    }

    #[test]
    fn out_of_range_quantile_rejected_before_table_check() {
        let err = select(&SummaryTable::default(), &[1.5]).expect_err("range");
        assert!(matches!(err, LabError::InvalidQuantile(_)));
        let err = select(&table(&[1.0]), &[f64::NAN]).expect_err("nan");
        assert!(matches!(err, LabError::InvalidQuantile(_)));
    }

    #[test]
    fn quantile_names() {
        let names: Vec<String> = [0.0, 0.25, 0.5, 1.0, -0.0]
            .iter()
            .map(|value| Quantile::new(*value).unwrap().to_string())
            .collect();
        assert_eq!(names, ["0", "0.25", "0.5", "1", "0"]);
    }
}
