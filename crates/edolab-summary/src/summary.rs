//! Per-individual summary rows and the table they form.

use std::fs;
use std::path::Path;

use edolab_core::errors::{ErrorInfo, LabError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::family::DistributionFamily;
use crate::individual::Individual;
use crate::trial::TrialLayout;

/// Header of a serialized summary table, in column order.
pub const SUMMARY_COLUMNS: [&str; 7] = [
    "individual",
    "nrows",
    "ncols",
    "memory",
    "generation",
    "fitness",
    "seed",
];

/// Structural metadata of one individual joined with its fitness entry.
///
/// Field order is the serialized column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Index within the generation.
    pub individual: u64,
    /// Row count of the individual's table.
    pub nrows: u64,
    /// Column count of the individual's table.
    pub ncols: u64,
    /// Estimated in-memory size in bytes.
    pub memory: u64,
    /// Generation index.
    pub generation: u64,
    /// Fitness score.
    pub fitness: f64,
    /// Evaluation seed; identifies the trial.
    pub seed: u64,
}

/// Ordered summary rows: trial order, then generation, then individual.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Wraps rows without reordering them.
    pub fn from_rows(rows: Vec<SummaryRow>) -> Self {
        Self { rows }
    }

    /// Concatenates tables, preserving their order.
    pub fn concat(tables: impl IntoIterator<Item = SummaryTable>) -> Self {
        Self {
            rows: tables.into_iter().flat_map(|table| table.rows).collect(),
        }
    }

    /// All rows.
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Row at `index`.
    pub fn row(&self, index: usize) -> Option<&SummaryRow> {
        self.rows.get(index)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// CSV encoding with the fixed summary header.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, LabError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if self.rows.is_empty() {
            writer
                .write_record(SUMMARY_COLUMNS)
                .map_err(|err| LabError::io("summary-encode", err))?;
        }
        for row in &self.rows {
            writer
                .serialize(row)
                .map_err(|err| LabError::io("summary-encode", err))?;
        }
        writer
            .into_inner()
            .map_err(|err| LabError::io("summary-encode", err))
    }

    /// Writes the table as CSV, creating parent directories.
    pub fn write_csv(&self, path: &Path) -> Result<(), LabError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                LabError::Io(
                    ErrorInfo::new("summary-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        fs::write(path, self.to_csv_bytes()?).map_err(|err| {
            LabError::Io(
                ErrorInfo::new("summary-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Reads a table previously written by [`SummaryTable::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self, LabError> {
        let mut reader = csv::Reader::from_path(path).map_err(|err| {
            LabError::Io(
                ErrorInfo::new("summary-open", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<SummaryRow>, _>>()
            .map_err(|err| {
                LabError::Io(
                    ErrorInfo::new("summary-parse", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
        Ok(Self { rows })
    }
}

/// Summarises one trial: one row per on-disk individual that has a fitness
/// entry, in generation then individual order.
///
/// Individuals missing from the fitness log are skipped silently. Individuals
/// that fail to decode (unknown family, bad cells, unreadable files) are
/// dropped with a warning. A missing or malformed fitness log fails the trial.
pub fn summarize_trial(
    trial_root: &Path,
    families: &[DistributionFamily],
) -> Result<SummaryTable, LabError> {
    let trial = TrialLayout::new(trial_root);
    let log = trial.fitness_log()?;
    let mut rows = Vec::with_capacity(log.len());
    let mut dropped = 0_usize;
    for location in trial.individuals()? {
        let location = location?;
        let Some(entry) = log.get(location.generation, location.individual) else {
            debug!(
                generation = location.generation,
                individual = location.individual,
                "no fitness entry; skipping"
            );
            continue;
        };
        let individual = match Individual::load(&location.path, families) {
            Ok(individual) => individual,
            Err(err) => {
                dropped += 1;
                warn!(
                    trial = %trial_root.display(),
                    generation = location.generation,
                    individual = location.individual,
                    error = %err,
                    "dropping individual from summary"
                );
                continue;
            }
        };
        rows.push(SummaryRow {
            individual: location.individual,
            nrows: individual.nrows() as u64,
            ncols: individual.ncols() as u64,
            memory: individual.memory(),
            generation: location.generation,
            fitness: entry.fitness,
            seed: entry.seed,
        });
    }
    info!(
        trial = %trial_root.display(),
        rows = rows.len(),
        dropped,
        "summarised trial"
    );
    Ok(SummaryTable { rows })
}
