//! Summarisation of evolutionary dataset optimisation runs.
//!
//! An experiment's trials are walked generation by generation, every scored
//! individual becomes one row of a summary table, and representative
//! individuals are chosen at fitness quantiles and written out in a
//! reconstructable form.

pub mod archive;
pub mod canonical;
pub mod experiment;
pub mod family;
pub mod individual;
pub mod schema;
pub mod select;
pub mod summary;
pub mod synth;
pub mod trial;
pub mod write;

pub use archive::archive_dir;
pub use canonical::{stable_hash_string, to_canonical_json_bytes};
pub use experiment::{
    summarise_experiment, summarise_trials, ExperimentLayout, ExperimentSummary,
    SummariseOptions, TrialsSummary, DEFAULT_QUANTILES,
};
pub use family::{BuiltinFamily, DistributionFamily, FamilyDescriptor, Limits, Params, Sampler};
pub use individual::{Individual, ReconstructionState, SubtypeRecord};
pub use schema::{resolve, ExperimentConfig, OptimiserArgs, OptimiserParams};
pub use select::{parse_quantiles, select, Quantile, RepresentativeIndex};
pub use summary::{summarize_trial, SummaryRow, SummaryTable, SUMMARY_COLUMNS};
pub use synth::{synthesise_experiment, SynthOptions, SynthReport};
pub use trial::{FitnessLog, TrialLayout};
pub use write::{is_complete, write_representatives, WriteReport};
