//! On-disk individual format: the `main.csv` table, its `main.meta` subtype
//! record and the `main.state` reconstruction state.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use edolab_core::errors::{ErrorInfo, LabError};
use edolab_core::{Cell, ColumnKind, SeedLineage};
use serde::{Deserialize, Serialize};

use crate::family::{DistributionFamily, Params};

/// Table file inside an individual directory.
pub const TABLE_FILE: &str = "main.csv";
/// Subtype record inside an individual directory.
pub const META_FILE: &str = "main.meta";
/// Reconstruction state inside an individual directory.
pub const STATE_FILE: &str = "main.state";

/// Fixed index overhead added to every memory estimate, in bytes.
pub const INDEX_OVERHEAD_BYTES: u64 = 128;

/// Subtype tag for one column: which family generated it and with what
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSubtype {
    /// Column header.
    pub name: String,
    /// Name of the generating family.
    pub family: String,
    /// Subtype identifier assigned by the optimiser.
    #[serde(default)]
    pub subtype: u64,
    /// Parameters the column was sampled with.
    #[serde(default)]
    pub params: Params,
}

/// Per-column subtype record persisted as `main.meta`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubtypeRecord {
    /// Column tags in table order.
    pub columns: Vec<ColumnSubtype>,
}

impl SubtypeRecord {
    /// Canonical YAML form.
    pub fn to_yaml(&self) -> Result<String, LabError> {
        serde_yaml::to_string(self).map_err(|err| LabError::io("meta-encode", err))
    }
}

/// State needed to regenerate an individual, persisted as `main.state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionState {
    /// Position of the individual and the trial seed it descends from.
    pub lineage: SeedLineage,
    /// Seed derived from the lineage.
    pub individual_seed: u64,
    /// State written by the optimiser, preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimiser_state: Option<String>,
}

impl ReconstructionState {
    /// Builds the state for a lineage.
    pub fn new(lineage: SeedLineage, optimiser_state: Option<String>) -> Self {
        Self {
            lineage,
            individual_seed: lineage.individual_seed(),
            optimiser_state,
        }
    }

    /// Canonical YAML form.
    pub fn to_yaml(&self) -> Result<String, LabError> {
        serde_yaml::to_string(self).map_err(|err| LabError::io("state-encode", err))
    }
}

/// A decoded column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Subtype tag of the column.
    pub subtype: ColumnSubtype,
    /// Storage class from the generating family.
    pub kind: ColumnKind,
    /// Values top to bottom.
    pub values: Vec<Cell>,
}

/// A candidate table decoded against the experiment's families.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    columns: Vec<Column>,
    nrows: usize,
    optimiser_state: Option<String>,
}

impl Individual {
    /// Assembles an individual from columns of equal length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, LabError> {
        let nrows = columns.first().map_or(0, |column| column.values.len());
        if let Some(column) = columns.iter().find(|column| column.values.len() != nrows) {
            return Err(LabError::SchemaMismatch(
                ErrorInfo::new("column-length", "columns differ in length")
                    .with_context("column", column.subtype.name.clone())
                    .with_context("expected", nrows.to_string())
                    .with_context("found", column.values.len().to_string()),
            ));
        }
        Ok(Self {
            columns,
            nrows,
            optimiser_state: None,
        })
    }

    /// Reads an individual directory, decoding each column with the family
    /// named in its subtype record.
    pub fn load(dir: &Path, families: &[DistributionFamily]) -> Result<Self, LabError> {
        let by_name: HashMap<&str, &DistributionFamily> = families
            .iter()
            .map(|family| (family.name(), family))
            .collect();

        let meta_path = dir.join(META_FILE);
        let meta_text = fs::read_to_string(&meta_path).map_err(|err| {
            LabError::Io(
                ErrorInfo::new("meta-read", err.to_string())
                    .with_context("path", meta_path.display().to_string()),
            )
        })?;
        let record: SubtypeRecord = serde_yaml::from_str(&meta_text).map_err(|err| {
            LabError::Io(
                ErrorInfo::new("meta-parse", err.to_string())
                    .with_context("path", meta_path.display().to_string()),
            )
        })?;

        let mut kinds = Vec::with_capacity(record.columns.len());
        for column in &record.columns {
            let family = by_name.get(column.family.as_str()).ok_or_else(|| {
                LabError::SchemaMismatch(
                    ErrorInfo::new("family-unknown", "subtype record names an undeclared family")
                        .with_context("family", column.family.clone())
                        .with_context("path", meta_path.display().to_string()),
                )
            })?;
            kinds.push(family.kind());
        }

        let table_path = dir.join(TABLE_FILE);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&table_path)
            .map_err(|err| {
                LabError::Io(
                    ErrorInfo::new("table-open", err.to_string())
                        .with_context("path", table_path.display().to_string()),
                )
            })?;
        let headers = reader
            .headers()
            .map_err(|err| LabError::io("table-header", err))?
            .clone();
        let header_names: Vec<&str> = headers.iter().collect();
        let record_names: Vec<&str> = record.columns.iter().map(|c| c.name.as_str()).collect();
        if header_names != record_names {
            return Err(LabError::SchemaMismatch(
                ErrorInfo::new("column-names", "table header disagrees with subtype record")
                    .with_context("header", header_names.join(","))
                    .with_context("record", record_names.join(","))
                    .with_context("path", table_path.display().to_string()),
            ));
        }

        let mut values: Vec<Vec<Cell>> = vec![Vec::new(); kinds.len()];
        for (row, line) in reader.records().enumerate() {
            let line = line.map_err(|err| {
                LabError::Io(
                    ErrorInfo::new("table-row", err.to_string())
                        .with_context("row", row.to_string())
                        .with_context("path", table_path.display().to_string()),
                )
            })?;
            for (col, (raw, kind)) in line.iter().zip(&kinds).enumerate() {
                let cell = kind.decode(raw).ok_or_else(|| {
                    LabError::SchemaMismatch(
                        ErrorInfo::new("cell-decode", format!("`{raw}` is not a {kind} value"))
                            .with_context("row", row.to_string())
                            .with_context("column", record_names[col].to_string())
                            .with_context("path", table_path.display().to_string()),
                    )
                })?;
                values[col].push(cell);
            }
        }

        let columns = record
            .columns
            .into_iter()
            .zip(kinds)
            .zip(values)
            .map(|((subtype, kind), values)| Column {
                subtype,
                kind,
                values,
            })
            .collect();
        let mut individual = Self::from_columns(columns)?;

        let state_path = dir.join(STATE_FILE);
        if state_path.is_file() {
            let state = fs::read_to_string(&state_path).map_err(|err| {
                LabError::Io(
                    ErrorInfo::new("state-read", err.to_string())
                        .with_context("path", state_path.display().to_string()),
                )
            })?;
            individual.optimiser_state = Some(state);
        }
        Ok(individual)
    }

    /// Attaches the optimiser state carried alongside the table.
    pub fn with_optimiser_state(mut self, state: Option<String>) -> Self {
        self.optimiser_state = state;
        self
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Decoded columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// State written by the optimiser, if any.
    pub fn optimiser_state(&self) -> Option<&str> {
        self.optimiser_state.as_deref()
    }

    /// Estimated in-memory size: index overhead plus `nrows * width` for
    /// every column.
    pub fn memory(&self) -> u64 {
        let rows = self.nrows as u64;
        INDEX_OVERHEAD_BYTES
            + self
                .columns
                .iter()
                .map(|column| rows * column.kind.width())
                .sum::<u64>()
    }

    /// Subtype record describing the columns.
    pub fn subtypes(&self) -> SubtypeRecord {
        SubtypeRecord {
            columns: self
                .columns
                .iter()
                .map(|column| column.subtype.clone())
                .collect(),
        }
    }

    /// Canonical CSV encoding of the table.
    pub fn table_bytes(&self) -> Result<Vec<u8>, LabError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(self.columns.iter().map(|column| column.subtype.name.as_str()))
            .map_err(|err| LabError::io("table-encode", err))?;
        for row in 0..self.nrows {
            writer
                .write_record(
                    self.columns
                        .iter()
                        .map(|column| column.values[row].to_string()),
                )
                .map_err(|err| LabError::io("table-encode", err))?;
        }
        writer
            .into_inner()
            .map_err(|err| LabError::io("table-encode", err))
    }

    /// Writes `main.csv`, `main.meta` and `main.state` into `dir`.
    pub fn save(&self, dir: &Path, state: &ReconstructionState) -> Result<(), LabError> {
        fs::create_dir_all(dir).map_err(|err| {
            LabError::Io(
                ErrorInfo::new("individual-mkdir", err.to_string())
                    .with_context("path", dir.display().to_string()),
            )
        })?;
        write_file(&dir.join(TABLE_FILE), &self.table_bytes()?)?;
        write_file(&dir.join(META_FILE), self.subtypes().to_yaml()?.as_bytes())?;
        write_file(&dir.join(STATE_FILE), state.to_yaml()?.as_bytes())
    }
}

pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<(), LabError> {
    fs::write(path, bytes).map_err(|err| {
        LabError::Io(
            ErrorInfo::new("file-write", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::BuiltinFamily;

    fn families() -> Vec<DistributionFamily> {
        vec![
            DistributionFamily::builtin(BuiltinFamily::Uniform),
            DistributionFamily::builtin(BuiltinFamily::Poisson),
            DistributionFamily::builtin(BuiltinFamily::Bernoulli),
        ]
    }

    fn column(name: &str, family: &str, kind: ColumnKind, values: Vec<Cell>) -> Column {
        Column {
            subtype: ColumnSubtype {
                name: name.to_string(),
                family: family.to_string(),
                subtype: 0,
                params: Params::default(),
            },
            kind,
            values,
        }
    }

    fn sample() -> Individual {
        Individual::from_columns(vec![
            column(
                "0",
                "Uniform",
                ColumnKind::Float,
                vec![Cell::Float(0.25), Cell::Float(-1.5)],
            ),
            column(
                "1",
                "Poisson",
                ColumnKind::Integer,
                vec![Cell::Integer(3), Cell::Integer(0)],
            ),
            column(
                "2",
                "Bernoulli",
                ColumnKind::Boolean,
                vec![Cell::Boolean(true), Cell::Boolean(false)],
            ),
        ])
        .expect("individual")
    }

    #[test]
    fn memory_depends_on_shape_and_kind() {
        let individual = sample();
        assert_eq!(individual.memory(), INDEX_OVERHEAD_BYTES + 2 * 8 + 2 * 8 + 2);
    }

    #[test]
    fn save_then_load_preserves_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let individual = sample();
        let state = ReconstructionState::new(SeedLineage::new(0, 1, 2), None);
        individual.save(dir.path(), &state).expect("save");
        let loaded = Individual::load(dir.path(), &families()).expect("load");
        assert_eq!(loaded.columns(), individual.columns());
        assert_eq!(loaded.memory(), individual.memory());
        assert!(loaded.optimiser_state().is_some());
    }

    #[test]
    fn unknown_family_is_schema_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = ReconstructionState::new(SeedLineage::new(0, 0, 0), None);
        sample().save(dir.path(), &state).expect("save");
        let err = Individual::load(
            dir.path(),
            &[DistributionFamily::builtin(BuiltinFamily::Uniform)],
        )
        .expect_err("Poisson undeclared");
        assert!(matches!(err, LabError::SchemaMismatch(_)));
        assert_eq!(err.info().context["family"], "Poisson");
    }

    #[test]
    fn undecodable_cell_is_schema_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = ReconstructionState::new(SeedLineage::new(0, 0, 0), None);
        sample().save(dir.path(), &state).expect("save");
        fs::write(dir.path().join(TABLE_FILE), "0,1,2\n0.5,1.5,true\n").expect("rewrite");
        let err = Individual::load(dir.path(), &families()).expect_err("1.5 is not an integer");
        assert_eq!(err.info().code, "cell-decode");
    }

    #[test]
    fn ragged_columns_rejected() {
        let err = Individual::from_columns(vec![
            column("0", "Uniform", ColumnKind::Float, vec![Cell::Float(1.0)]),
            column("1", "Uniform", ColumnKind::Float, vec![]),
        ])
        .expect_err("ragged");
        assert_eq!(err.info().code, "column-length");
    }
}
