//! Experiment-level summarisation across every trial.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use edolab_core::errors::{ErrorInfo, LabError};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::archive::archive_dir;
use crate::family::DistributionFamily;
use crate::schema::{resolve, ExperimentConfig};
use crate::select::{parse_quantiles, select, Quantile};
use crate::summary::{summarize_trial, SummaryTable};
use crate::trial::numbered_dirs;
use crate::write::write_representatives;

/// Quantiles written when the caller asks for none.
pub const DEFAULT_QUANTILES: [f64; 3] = [0.0, 0.5, 1.0];

/// File name of the experiment-wide summary table.
pub const SUMMARY_FILE: &str = "main.csv";

/// Directory layout of one experiment under an output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentLayout {
    root: PathBuf,
}

impl ExperimentLayout {
    /// Layout for experiment `name` under `root`.
    pub fn new(root: &Path, name: &str) -> Self {
        Self {
            root: root.join(name),
        }
    }

    /// `<root>/<name>`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one subdirectory per trial.
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Directory receiving the summary table and representatives.
    pub fn summary_dir(&self) -> PathBuf {
        self.root.join("summary")
    }

    /// Archive replacing the data directory when packaging is requested.
    pub fn archive_path(&self) -> PathBuf {
        self.root.join("data.tar.gz")
    }
}

/// Options for [`summarise_experiment`].
#[derive(Debug, Clone, PartialEq)]
pub struct SummariseOptions {
    /// Quantiles to select representatives at.
    pub quantiles: Vec<f64>,
    /// Worker threads used to summarise trials.
    pub cores: usize,
    /// Pack the data tree into `data.tar.gz` and remove it afterwards.
    pub tarball: bool,
}

impl Default for SummariseOptions {
    fn default() -> Self {
        Self {
            quantiles: DEFAULT_QUANTILES.to_vec(),
            cores: 1,
            tarball: false,
        }
    }
}

/// Result of summarising every trial of an experiment.
#[derive(Debug, Default)]
pub struct TrialsSummary {
    /// Rows of every readable trial, in trial order.
    pub table: SummaryTable,
    /// Trials that could not be summarised.
    pub skipped: BTreeMap<u64, LabError>,
}

/// Summarises every integer-named trial under `data_dir` on `cores` threads.
///
/// A trial that fails (for example a corrupt fitness log) is logged and
/// recorded in [`TrialsSummary::skipped`]; its siblings still contribute.
pub fn summarise_trials(
    data_dir: &Path,
    families: &[DistributionFamily],
    cores: usize,
) -> Result<TrialsSummary, LabError> {
    if !data_dir.is_dir() {
        return Err(LabError::Io(
            ErrorInfo::new("data-missing", "experiment data directory not found")
                .with_context("path", data_dir.display().to_string()),
        ));
    }
    let trials = numbered_dirs(data_dir)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cores.max(1))
        .build()
        .map_err(|err| LabError::io("thread-pool", err))?;
    let results: Vec<(u64, Result<SummaryTable, LabError>)> = pool.install(|| {
        trials
            .par_iter()
            .map(|(trial, path)| (*trial, summarize_trial(path, families)))
            .collect()
    });

    let mut summary = TrialsSummary::default();
    let mut tables = Vec::with_capacity(results.len());
    for (trial, result) in results {
        match result {
            Ok(table) => tables.push(table),
            Err(err) => {
                warn!(trial, error = %err, "skipping trial");
                summary.skipped.insert(trial, err);
            }
        }
    }
    summary.table = SummaryTable::concat(tables);
    Ok(summary)
}

/// Everything produced by [`summarise_experiment`].
#[derive(Debug)]
pub struct ExperimentSummary {
    /// Concatenated summary table.
    pub table: SummaryTable,
    /// Trials left out of the table.
    pub skipped: BTreeMap<u64, LabError>,
    /// Representative directories per quantile.
    pub representatives: BTreeMap<Quantile, PathBuf>,
    /// Archive written in place of the data directory.
    pub archive: Option<PathBuf>,
}

/// Summarises an experiment stored under `root/<name>/data`.
///
/// Families and quantiles are validated before anything is read. The
/// summary table lands in `summary/main.csv` and representatives in
/// `summary/<quantile>/`. The data tree is only archived and removed once
/// every representative has been written.
pub fn summarise_experiment(
    config: &ExperimentConfig,
    root: &Path,
    options: &SummariseOptions,
) -> Result<ExperimentSummary, LabError> {
    let families = resolve(config)?;
    let quantiles = parse_quantiles(&options.quantiles)?;
    let layout = ExperimentLayout::new(root, config.name());
    info!(
        experiment = config.name(),
        families = families.len(),
        quantiles = quantiles.len(),
        "summarising experiment"
    );

    let trials = summarise_trials(&layout.data_dir(), &families, options.cores)?;
    if trials.table.is_empty() {
        return Err(LabError::EmptyTable(
            ErrorInfo::new("summary-empty", "no scored individuals found in any trial")
                .with_context("path", layout.data_dir().display().to_string())
                .with_context("skipped_trials", trials.skipped.len().to_string()),
        ));
    }

    let summary_dir = layout.summary_dir();
    trials.table.write_csv(&summary_dir.join(SUMMARY_FILE))?;
    let index = select(&trials.table, &options.quantiles)?;
    let report = write_representatives(
        &trials.table,
        &index,
        &families,
        &layout.data_dir(),
        &summary_dir,
    )?;
    let representatives = report.into_result()?;

    let archive = if options.tarball {
        let archive_path = layout.archive_path();
        archive_dir(&layout.data_dir(), &archive_path)?;
        fs::remove_dir_all(layout.data_dir()).map_err(|err| {
            LabError::Io(
                ErrorInfo::new("data-remove", err.to_string())
                    .with_context("path", layout.data_dir().display().to_string()),
            )
        })?;
        Some(archive_path)
    } else {
        None
    };

    info!(
        experiment = config.name(),
        rows = trials.table.len(),
        representatives = representatives.len(),
        "experiment summarised"
    );
    Ok(ExperimentSummary {
        table: trials.table,
        skipped: trials.skipped,
        representatives,
        archive,
    })
}
