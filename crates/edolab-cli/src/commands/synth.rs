use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use edolab_summary::{synthesise_experiment, ExperimentConfig, SynthOptions};

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// YAML experiment definition.
    pub experiment: PathBuf,
    /// Output root; trials land in `<name>/data/<trial>/`.
    pub root: PathBuf,
    /// Number of trials to write.
    #[arg(long, default_value_t = 1)]
    pub trials: u64,
    /// Generations per trial.
    #[arg(long, default_value_t = 3)]
    pub generations: u64,
    /// Seed mixed into every individual's sampling stream.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub fn run(args: &SynthArgs) -> Result<(), Box<dyn Error>> {
    let config = ExperimentConfig::from_path(&args.experiment)
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    let options = SynthOptions {
        trials: args.trials,
        generations: args.generations,
        seed: args.seed,
    };
    let report = synthesise_experiment(&config, &args.root, &options)
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    for trial in &report.trials {
        println!("{}", trial.display());
    }
    Ok(())
}
