use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use edolab_summary::{
    summarise_experiment, to_canonical_json_bytes, ExperimentConfig, SummariseOptions,
    DEFAULT_QUANTILES,
};
use serde::Serialize;
use tracing::info;

#[derive(Args, Debug)]
pub struct SummariseArgs {
    /// YAML experiment definition.
    pub experiment: PathBuf,
    /// Output root holding `<name>/data/<trial>/`.
    pub root: PathBuf,
    /// Fitness quantiles to select representatives at.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_QUANTILES)]
    pub quantiles: Vec<f64>,
    /// Worker threads used to summarise trials.
    #[arg(long, default_value_t = 1)]
    pub cores: usize,
    /// Pack the data tree into `data.tar.gz` and remove it afterwards.
    #[arg(long)]
    pub tarball: bool,
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    experiment: String,
    rows: usize,
    skipped_trials: Vec<u64>,
    representatives: BTreeMap<String, String>,
    archive: Option<String>,
}

pub fn run(args: &SummariseArgs) -> Result<(), Box<dyn Error>> {
    let config = ExperimentConfig::from_path(&args.experiment)
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    let options = SummariseOptions {
        quantiles: args.quantiles.clone(),
        cores: args.cores,
        tarball: args.tarball,
    };
    let summary = summarise_experiment(&config, &args.root, &options)
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    info!(
        experiment = config.name(),
        rows = summary.table.len(),
        skipped = summary.skipped.len(),
        "summary complete"
    );

    let output = SummaryOutput {
        experiment: config.name().to_string(),
        rows: summary.table.len(),
        skipped_trials: summary.skipped.keys().copied().collect(),
        representatives: summary
            .representatives
            .iter()
            .map(|(quantile, dir)| (quantile.to_string(), dir.display().to_string()))
            .collect(),
        archive: summary
            .archive
            .as_ref()
            .map(|path| path.display().to_string()),
    };
    let json = to_canonical_json_bytes(&output).map_err(|err| Box::new(err) as Box<dyn Error>)?;
    println!("{}", String::from_utf8(json)?);
    Ok(())
}
