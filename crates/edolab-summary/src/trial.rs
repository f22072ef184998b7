//! On-disk layout of a single trial: generation directories and the fitness log.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use edolab_core::errors::{ErrorInfo, LabError};
use serde::Deserialize;
use tracing::warn;
use walkdir::WalkDir;

/// Fitness log written by the optimiser at the trial root.
pub const FITNESS_FILE: &str = "fitness.csv";

/// Where an individual lives inside its trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndividualLocation {
    /// Generation index.
    pub generation: u64,
    /// Index within the generation.
    pub individual: u64,
    /// Directory holding the individual's files.
    pub path: PathBuf,
}

/// Lists the integer-named subdirectories of `dir` in ascending numeric order.
///
/// Anything else (files, `subtypes/`, hidden entries) is ignored.
pub fn numbered_dirs(dir: &Path) -> Result<Vec<(u64, PathBuf)>, LabError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| {
            LabError::Io(
                ErrorInfo::new("dir-list", err.to_string())
                    .with_context("path", dir.display().to_string()),
            )
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Some(index) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u64>().ok())
        {
            entries.push((index, entry.into_path()));
        }
    }
    entries.sort_by_key(|(index, _)| *index);
    Ok(entries)
}

/// A trial directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialLayout {
    root: PathBuf,
}

impl TrialLayout {
    /// Wraps a trial root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Trial root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generation directories in ascending order.
    pub fn generations(&self) -> Result<Vec<(u64, PathBuf)>, LabError> {
        numbered_dirs(&self.root)
    }

    /// Walks every individual, generation by generation.
    ///
    /// The walk lists directories as it goes, so calling this again
    /// re-enumerates from the start and sees the current disk contents.
    pub fn individuals(&self) -> Result<IndividualWalk, LabError> {
        Ok(IndividualWalk {
            generations: self.generations()?.into_iter(),
            current: None,
        })
    }

    /// Parses the trial's fitness log.
    pub fn fitness_log(&self) -> Result<FitnessLog, LabError> {
        FitnessLog::load(&self.root.join(FITNESS_FILE))
    }
}

/// Lazy iterator over the individuals of a trial.
#[derive(Debug)]
pub struct IndividualWalk {
    generations: std::vec::IntoIter<(u64, PathBuf)>,
    current: Option<(u64, std::vec::IntoIter<(u64, PathBuf)>)>,
}

impl Iterator for IndividualWalk {
    type Item = Result<IndividualLocation, LabError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((generation, individuals)) = &mut self.current {
                if let Some((individual, path)) = individuals.next() {
                    return Some(Ok(IndividualLocation {
                        generation: *generation,
                        individual,
                        path,
                    }));
                }
            }
            let (generation, path) = self.generations.next()?;
            match numbered_dirs(&path) {
                Ok(individuals) => self.current = Some((generation, individuals.into_iter())),
                Err(err) => {
                    self.current = None;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Fitness and seed recorded for one evaluated individual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessEntry {
    /// Fitness score.
    pub fitness: f64,
    /// Seed of the evaluation; identifies the trial.
    pub seed: u64,
}

#[derive(Debug, Deserialize)]
struct FitnessRecord {
    generation: u64,
    individual: u64,
    fitness: f64,
    seed: u64,
}

/// Required columns of `fitness.csv`.
pub const FITNESS_COLUMNS: [&str; 4] = ["generation", "individual", "fitness", "seed"];

/// Parsed `fitness.csv`, keyed by `(generation, individual)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitnessLog {
    entries: BTreeMap<(u64, u64), FitnessEntry>,
}

impl FitnessLog {
    /// Reads a fitness log; column order in the file is irrelevant.
    pub fn load(path: &Path) -> Result<Self, LabError> {
        let corrupt = |code: &str, message: String| {
            LabError::CorruptTrial(
                ErrorInfo::new(code, message).with_context("path", path.display().to_string()),
            )
        };
        if !path.is_file() {
            return Err(corrupt("fitness-missing", "fitness log not found".to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|err| corrupt("fitness-open", err.to_string()))?;
        let headers = reader
            .headers()
            .map_err(|err| corrupt("fitness-header", err.to_string()))?
            .clone();
        let missing: Vec<&str> = FITNESS_COLUMNS
            .iter()
            .copied()
            .filter(|column| !headers.iter().any(|header| header == *column))
            .collect();
        if !missing.is_empty() {
            return Err(LabError::CorruptTrial(
                ErrorInfo::new("fitness-columns", "fitness log lacks required columns")
                    .with_context("path", path.display().to_string())
                    .with_context("missing", missing.join(",")),
            ));
        }

        let mut entries = BTreeMap::new();
        for (line, record) in reader.deserialize::<FitnessRecord>().enumerate() {
            let record = record.map_err(|err| {
                LabError::CorruptTrial(
                    ErrorInfo::new("fitness-row", err.to_string())
                        .with_context("path", path.display().to_string())
                        .with_context("line", (line + 2).to_string()),
                )
            })?;
            let key = (record.generation, record.individual);
            if entries.contains_key(&key) {
                warn!(
                    path = %path.display(),
                    generation = record.generation,
                    individual = record.individual,
                    "duplicate fitness entry ignored"
                );
                continue;
            }
            entries.insert(
                key,
                FitnessEntry {
                    fitness: record.fitness,
                    seed: record.seed,
                },
            );
        }
        Ok(Self { entries })
    }

    /// Entry for an individual, if it was evaluated.
    pub fn get(&self, generation: u64, individual: u64) -> Option<FitnessEntry> {
        self.entries.get(&(generation, individual)).copied()
    }

    /// Number of scored individuals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no individual was scored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn numbered_dirs_sort_numerically_and_skip_others() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["10", "2", "0", "subtypes"] {
            fs::create_dir(dir.path().join(name)).expect("mkdir");
        }
        fs::write(dir.path().join("3"), "not a directory").expect("file");
        let listed: Vec<u64> = numbered_dirs(dir.path())
            .expect("list")
            .into_iter()
            .map(|(index, _)| index)
            .collect();
        assert_eq!(listed, [0, 2, 10]);
    }

    #[test]
    fn walk_is_restartable() {
        let dir = tempfile::tempdir().expect("tempdir");
        for (generation, individual) in [(0, 0), (0, 1), (1, 0), (2, 1)] {
            fs::create_dir_all(dir.path().join(format!("{generation}/{individual}")))
                .expect("mkdir");
        }
        let trial = TrialLayout::new(dir.path());
        let collect = || -> Vec<(u64, u64)> {
            trial
                .individuals()
                .expect("walk")
                .map(|loc| {
                    let loc = loc.expect("location");
                    (loc.generation, loc.individual)
                })
                .collect()
        };
        let first = collect();
        assert_eq!(first, [(0, 0), (0, 1), (1, 0), (2, 1)]);
        assert_eq!(collect(), first);
    }

    #[test]
    fn fitness_columns_any_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(FITNESS_FILE);
        fs::write(
            &path,
            "fitness,generation,individual,seed\n-0.5,0,1,0\n0.25,1,0,0\n",
        )
        .expect("write");
        let log = FitnessLog::load(&path).expect("load");
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.get(0, 1),
            Some(FitnessEntry {
                fitness: -0.5,
                seed: 0
            })
        );
        assert_eq!(log.get(3, 3), None);
    }

    #[test]
    fn missing_log_is_corrupt_trial() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FitnessLog::load(&dir.path().join(FITNESS_FILE)).expect_err("missing");
        assert!(matches!(err, LabError::CorruptTrial(_)));
        assert_eq!(err.info().code, "fitness-missing");
    }

    #[test]
    fn missing_column_is_corrupt_trial() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(FITNESS_FILE);
        fs::write(&path, "generation,individual,fitness\n0,0,1.0\n").expect("write");
        let err = FitnessLog::load(&path).expect_err("no seed column");
        assert_eq!(err.info().code, "fitness-columns");
        assert_eq!(err.info().context["missing"], "seed");
    }

    #[test]
    fn duplicate_entries_keep_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(FITNESS_FILE);
        fs::write(
            &path,
            "generation,individual,fitness,seed\n0,0,1.0,4\n0,0,2.0,4\n",
        )
        .expect("write");
        let log = FitnessLog::load(&path).expect("load");
        assert_eq!(log.get(0, 0).map(|entry| entry.fitness), Some(1.0));
    }
}
