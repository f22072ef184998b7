//! Synthetic trial trees in the optimiser's on-disk layout.
//!
//! Individuals are sampled from the experiment's families and scored with a
//! placeholder fitness (the mean of every cell). Useful for demos, smoke tests
//! and benchmarks; there is no evolution between generations.

use std::fs;
use std::path::{Path, PathBuf};

use edolab_core::errors::{ErrorInfo, LabError};
use edolab_core::{RngHandle, SeedLineage};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::experiment::ExperimentLayout;
use crate::family::DistributionFamily;
use crate::individual::{write_file, Column, ColumnSubtype, Individual, ReconstructionState};
use crate::schema::{resolve, ExperimentConfig};
use crate::trial::{FITNESS_COLUMNS, FITNESS_FILE};

const DEFAULT_SIZE: usize = 4;
const DEFAULT_ROW_LIMITS: [usize; 2] = [1, 5];
const DEFAULT_COL_LIMITS: [usize; 2] = [1, 3];

/// Shape of a synthetic experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthOptions {
    /// Number of trials; trial `t` is written with seed `t`.
    pub trials: u64,
    /// Generations per trial.
    pub generations: u64,
    /// Mixed into every individual's stream to vary the output.
    pub seed: u64,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            trials: 1,
            generations: 3,
            seed: 0,
        }
    }
}

/// What [`synthesise_experiment`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthReport {
    /// Trial directories in trial order.
    pub trials: Vec<PathBuf>,
    /// Total number of individuals written.
    pub individuals: usize,
}

/// Writes `root/<name>/data/<trial>/<generation>/<individual>/` for every
/// trial, plus a `fitness.csv` per trial scoring every individual.
pub fn synthesise_experiment(
    config: &ExperimentConfig,
    root: &Path,
    options: &SynthOptions,
) -> Result<SynthReport, LabError> {
    let families = resolve(config)?;
    let picker = FamilyPicker::new(&families, config.optimiser.weights.as_deref())?;
    let size = config.optimiser.size.unwrap_or(DEFAULT_SIZE);
    let row_limits = limits(config.optimiser.row_limits, DEFAULT_ROW_LIMITS, "row_limits")?;
    let col_limits = limits(config.optimiser.col_limits, DEFAULT_COL_LIMITS, "col_limits")?;
    let data_dir = ExperimentLayout::new(root, config.name()).data_dir();

    let mut report = SynthReport {
        trials: Vec::new(),
        individuals: 0,
    };
    for trial in 0..options.trials {
        let trial_dir = data_dir.join(trial.to_string());
        let mut fitness = csv::Writer::from_writer(Vec::new());
        fitness
            .write_record(FITNESS_COLUMNS)
            .map_err(|err| LabError::io("fitness-encode", err))?;
        for generation in 0..options.generations {
            for index in 0..size as u64 {
                let lineage = SeedLineage::new(trial, generation, index);
                let mut rng = RngHandle::from_seed(lineage.individual_seed() ^ options.seed);
                let nrows = rng.gen_range(row_limits[0]..=row_limits[1]);
                let ncols = rng.gen_range(col_limits[0]..=col_limits[1]);
                let individual = sample_individual(&families, &picker, nrows, ncols, &mut rng)?;
                let dir = trial_dir
                    .join(generation.to_string())
                    .join(index.to_string());
                individual.save(&dir, &ReconstructionState::new(lineage, None))?;
                fitness
                    .serialize((generation, index, mean_cell(&individual), trial))
                    .map_err(|err| LabError::io("fitness-encode", err))?;
                debug!(trial, generation, individual = index, "wrote synthetic individual");
                report.individuals += 1;
            }
        }
        let bytes = fitness
            .into_inner()
            .map_err(|err| LabError::io("fitness-encode", err))?;
        fs::create_dir_all(&trial_dir).map_err(|err| {
            LabError::Io(
                ErrorInfo::new("trial-mkdir", err.to_string())
                    .with_context("path", trial_dir.display().to_string()),
            )
        })?;
        write_file(&trial_dir.join(FITNESS_FILE), &bytes)?;
        report.trials.push(trial_dir);
    }
    info!(
        experiment = config.name(),
        trials = report.trials.len(),
        individuals = report.individuals,
        "synthesised experiment"
    );
    Ok(report)
}

fn limits(
    configured: Option<[usize; 2]>,
    default: [usize; 2],
    field: &str,
) -> Result<[usize; 2], LabError> {
    let [low, high] = configured.unwrap_or(default);
    if low == 0 || low > high {
        return Err(LabError::Configuration(
            ErrorInfo::new("limits-invalid", "limits must satisfy 1 <= low <= high")
                .with_context("field", field)
                .with_context("value", format!("[{low}, {high}]")),
        ));
    }
    Ok([low, high])
}

enum FamilyPicker {
    Uniform(usize),
    Weighted(WeightedIndex<f64>),
}

impl FamilyPicker {
    fn new(families: &[DistributionFamily], weights: Option<&[f64]>) -> Result<Self, LabError> {
        let Some(weights) = weights else {
            return Ok(Self::Uniform(families.len()));
        };
        if weights.len() != families.len() {
            return Err(LabError::Configuration(
                ErrorInfo::new("weights-length", "one weight is needed per family")
                    .with_context("weights", weights.len().to_string())
                    .with_context("families", families.len().to_string()),
            ));
        }
        WeightedIndex::new(weights).map(Self::Weighted).map_err(|err| {
            LabError::Configuration(ErrorInfo::new("weights-invalid", err.to_string()))
        })
    }

    fn pick(&self, rng: &mut RngHandle) -> usize {
        match self {
            Self::Uniform(count) => rng.gen_range(0..*count),
            Self::Weighted(index) => index.sample(rng),
        }
    }
}

fn sample_individual(
    families: &[DistributionFamily],
    picker: &FamilyPicker,
    nrows: usize,
    ncols: usize,
    rng: &mut RngHandle,
) -> Result<Individual, LabError> {
    let mut columns = Vec::with_capacity(ncols);
    for col in 0..ncols {
        let subtype = picker.pick(rng);
        let family = &families[subtype];
        let params = family.sample_params(rng);
        let values = family.sample(&params, nrows, rng)?;
        columns.push(Column {
            subtype: ColumnSubtype {
                name: col.to_string(),
                family: family.name().to_string(),
                subtype: subtype as u64,
                params,
            },
            kind: family.kind(),
            values,
        });
    }
    Individual::from_columns(columns)
}

fn mean_cell(individual: &Individual) -> f64 {
    let cells: Vec<f64> = individual
        .columns()
        .iter()
        .flat_map(|column| column.values.iter().map(|cell| cell.as_f64()))
        .collect();
    if cells.is_empty() {
        return 0.0;
    }
    cells.iter().sum::<f64>() / cells.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::TrialLayout;

    const EXPERIMENT: &str = r#"
name: demo
size: 2
row_limits: [2, 4]
col_limits: [1, 2]
distributions: [Uniform, Poisson, Bernoulli]
"#;

    #[test]
    fn writes_scored_individuals() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = ExperimentConfig::from_yaml_str(EXPERIMENT).expect("config");
        let options = SynthOptions {
            trials: 2,
            generations: 3,
            seed: 0,
        };
        let report = synthesise_experiment(&config, tmp.path(), &options).expect("synth");
        assert_eq!(report.trials.len(), 2);
        assert_eq!(report.individuals, 12);

        let trial = TrialLayout::new(&report.trials[1]);
        let log = trial.fitness_log().expect("log");
        assert_eq!(log.len(), 6);
        assert_eq!(log.get(2, 1).map(|entry| entry.seed), Some(1));
        assert_eq!(trial.individuals().expect("walk").count(), 6);
    }

    #[test]
    fn output_is_deterministic() {
        let config = ExperimentConfig::from_yaml_str(EXPERIMENT).expect("config");
        let options = SynthOptions::default();
        let a = tempfile::tempdir().expect("a");
        let b = tempfile::tempdir().expect("b");
        synthesise_experiment(&config, a.path(), &options).expect("a");
        synthesise_experiment(&config, b.path(), &options).expect("b");
        let rel = Path::new("demo/data/0/2/1/main.csv");
        assert_eq!(
            fs::read(a.path().join(rel)).expect("a"),
            fs::read(b.path().join(rel)).expect("b")
        );
    }

    #[test]
    fn mismatched_weights_rejected() {
        let text = format!("{EXPERIMENT}weights: [1.0]\n");
        let config = ExperimentConfig::from_yaml_str(&text).expect("config");
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = synthesise_experiment(&config, tmp.path(), &SynthOptions::default())
            .expect_err("one weight for three families");
        assert_eq!(err.info().code, "weights-length");
    }
}
