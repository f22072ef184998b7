//! Materialises selected representatives into quantile directories.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use edolab_core::errors::{ErrorInfo, LabError};
use edolab_core::SeedLineage;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::family::DistributionFamily;
use crate::individual::{
    write_file, Individual, ReconstructionState, SubtypeRecord, META_FILE, STATE_FILE, TABLE_FILE,
};
use crate::select::{Quantile, RepresentativeIndex};
use crate::summary::{SummaryRow, SummaryTable};

/// Human readable description inside each quantile directory.
pub const README_FILE: &str = "README";

/// The full file set of a finished quantile directory.
pub const REPRESENTATIVE_FILES: [&str; 4] = [README_FILE, TABLE_FILE, META_FILE, STATE_FILE];

/// Whether `dir` holds the full representative file set.
pub fn is_complete(dir: &Path) -> bool {
    REPRESENTATIVE_FILES
        .iter()
        .all(|name| dir.join(name).is_file())
}

/// Outcome of writing every requested quantile.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Finished quantile directories.
    pub written: BTreeMap<Quantile, PathBuf>,
    /// Quantiles that could not be written.
    pub failures: BTreeMap<Quantile, LabError>,
}

impl WriteReport {
    /// Whether every quantile was written.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the written directories, or one error summarising every
    /// failed quantile.
    pub fn into_result(self) -> Result<BTreeMap<Quantile, PathBuf>, LabError> {
        let Some((first_quantile, first)) = self.failures.iter().next() else {
            return Ok(self.written);
        };
        let mut info = ErrorInfo::new(
            "representatives-incomplete",
            format!(
                "{} of {} quantiles failed",
                self.failures.len(),
                self.failures.len() + self.written.len()
            ),
        )
        .with_context(
            "failed",
            self.failures
                .keys()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        );
        for (quantile, err) in &self.failures {
            info = info.with_context(format!("q{quantile}"), err.info().code.clone());
        }
        info = info.with_hint(format!("quantile {first_quantile}: {first}"));
        Err(match first {
            LabError::MissingIndividual(_) => LabError::MissingIndividual(info),
            _ => LabError::Io(info),
        })
    }
}

/// Writes each selected row's individual into `output_root/<quantile>/`.
///
/// A row resolves to `data_root/<seed>/<generation>/<individual>`. The
/// individual is decoded against `families` and its table re-emitted in
/// canonical form. Every quantile is attempted; failures are collected in the
/// report rather than aborting siblings. Output is staged in a hidden
/// directory and renamed into place once complete, replacing any previous
/// output for the quantile.
pub fn write_representatives(
    table: &SummaryTable,
    index: &RepresentativeIndex,
    families: &[DistributionFamily],
    data_root: &Path,
    output_root: &Path,
) -> Result<WriteReport, LabError> {
    fs::create_dir_all(output_root).map_err(|err| {
        LabError::Io(
            ErrorInfo::new("output-mkdir", err.to_string())
                .with_context("path", output_root.display().to_string()),
        )
    })?;
    let outcomes: Vec<(Quantile, Result<PathBuf, LabError>)> = index
        .par_iter()
        .map(|(quantile, row_index)| {
            let outcome = write_one(table, *quantile, *row_index, families, data_root, output_root);
            (*quantile, outcome)
        })
        .collect();

    let mut report = WriteReport::default();
    for (quantile, outcome) in outcomes {
        match outcome {
            Ok(dir) => {
                info!(quantile = %quantile, dir = %dir.display(), "wrote representative");
                report.written.insert(quantile, dir);
            }
            Err(err) => {
                warn!(quantile = %quantile, error = %err, "representative not written");
                report.failures.insert(quantile, err);
            }
        }
    }
    Ok(report)
}

fn write_one(
    table: &SummaryTable,
    quantile: Quantile,
    row_index: usize,
    families: &[DistributionFamily],
    data_root: &Path,
    output_root: &Path,
) -> Result<PathBuf, LabError> {
    let row = table.row(row_index).ok_or_else(|| {
        LabError::MissingIndividual(
            ErrorInfo::new("row-missing", "selected row is outside the summary table")
                .with_context("quantile", quantile.to_string())
                .with_context("row", row_index.to_string())
                .with_context("rows", table.len().to_string()),
        )
    })?;
    let relative = PathBuf::from(row.seed.to_string())
        .join(row.generation.to_string())
        .join(row.individual.to_string());
    let source = data_root.join(&relative);
    for file in ["", TABLE_FILE, META_FILE] {
        if !source.join(file).exists() {
            return Err(LabError::MissingIndividual(
                ErrorInfo::new("individual-missing", "representative not found on disk")
                    .with_context("quantile", quantile.to_string())
                    .with_context("path", source.join(file).display().to_string()),
            ));
        }
    }
    let individual = Individual::load(&source, families)?;
    let table_bytes = individual.table_bytes()?;
    let subtypes = individual.subtypes();
    let lineage = SeedLineage::new(row.seed, row.generation, row.individual);
    let state = ReconstructionState::new(
        lineage,
        individual.optimiser_state().map(str::to_string),
    );
    let readme = render_readme(quantile, row, &relative, &subtypes, &table_bytes);

    let target = output_root.join(quantile.to_string());
    let staging = output_root.join(format!(".{quantile}.partial"));
    remove_dir_if_present(&staging)?;
    let published = stage(&staging, &table_bytes, &subtypes, &state, &readme)
        .and_then(|()| publish(&staging, &target));
    if let Err(err) = published {
        let _ = fs::remove_dir_all(&staging);
        return Err(err);
    }
    Ok(target)
}

fn stage(
    staging: &Path,
    table_bytes: &[u8],
    subtypes: &SubtypeRecord,
    state: &ReconstructionState,
    readme: &str,
) -> Result<(), LabError> {
    fs::create_dir_all(staging).map_err(|err| {
        LabError::Io(
            ErrorInfo::new("staging-mkdir", err.to_string())
                .with_context("path", staging.display().to_string()),
        )
    })?;
    write_file(&staging.join(TABLE_FILE), table_bytes)?;
    write_file(&staging.join(META_FILE), subtypes.to_yaml()?.as_bytes())?;
    write_file(&staging.join(STATE_FILE), state.to_yaml()?.as_bytes())?;
    write_file(&staging.join(README_FILE), readme.as_bytes())
}

// Replaces any previous output for the quantile with the staged directory.
fn publish(staging: &Path, target: &Path) -> Result<(), LabError> {
    remove_dir_if_present(target)?;
    fs::rename(staging, target).map_err(|err| {
        LabError::Io(
            ErrorInfo::new("staging-rename", err.to_string())
                .with_context("from", staging.display().to_string())
                .with_context("to", target.display().to_string()),
        )
    })
}

fn remove_dir_if_present(dir: &Path) -> Result<(), LabError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|err| {
            LabError::Io(
                ErrorInfo::new("output-clear", err.to_string())
                    .with_context("path", dir.display().to_string()),
            )
        })?;
    }
    Ok(())
}

fn render_readme(
    quantile: Quantile,
    row: &SummaryRow,
    relative: &Path,
    subtypes: &SubtypeRecord,
    table_bytes: &[u8],
) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Representative individual at fitness quantile {quantile}");
    let _ = writeln!(text);
    let _ = writeln!(
        text,
        "source      {}",
        relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    );
    let _ = writeln!(text, "trial       {}", row.seed);
    let _ = writeln!(text, "generation  {}", row.generation);
    let _ = writeln!(text, "individual  {}", row.individual);
    let _ = writeln!(text, "fitness     {}", row.fitness);
    let _ = writeln!(text, "nrows       {}", row.nrows);
    let _ = writeln!(text, "ncols       {}", row.ncols);
    let _ = writeln!(text, "memory      {} bytes", row.memory);
    let _ = writeln!(text);
    let _ = writeln!(text, "columns");
    for column in &subtypes.columns {
        let _ = writeln!(
            text,
            "  {:<8} {} (subtype {})",
            column.name, column.family, column.subtype
        );
    }
    let _ = writeln!(text);
    let _ = writeln!(text, "main.csv    table re-encoded in canonical form");
    let _ = writeln!(text, "main.meta   family and parameters of each column");
    let _ = writeln!(text, "main.state  seed lineage and optimiser state");
    let _ = writeln!(
        text,
        "sha256      {:x}",
        Sha256::digest(table_bytes)
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_aggregates_failures() {
        let mut report = WriteReport::default();
        let q0 = Quantile::new(0.0).unwrap();
        let q1 = Quantile::new(1.0).unwrap();
        report.written.insert(q0, PathBuf::from("out/0"));
        report.failures.insert(
            q1,
            LabError::MissingIndividual(ErrorInfo::new("individual-missing", "gone")),
        );
        assert!(!report.is_complete());
        let err = report.into_result().expect_err("one failure");
        assert!(matches!(err, LabError::MissingIndividual(_)));
        assert_eq!(err.info().context["failed"], "1");
        assert_eq!(err.info().context["q1"], "individual-missing");
    }

    #[test]
    fn complete_report_returns_dirs() {
        let mut report = WriteReport::default();
        let q = Quantile::new(0.5).unwrap();
        report.written.insert(q, PathBuf::from("out/0.5"));
        let dirs = report.into_result().expect("complete");
        assert_eq!(dirs[&q], PathBuf::from("out/0.5"));
    }
}
