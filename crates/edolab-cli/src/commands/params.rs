use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use edolab_summary::{stable_hash_string, to_canonical_json_bytes, ExperimentConfig};

#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// YAML experiment definition.
    pub experiment: PathBuf,
    /// Print only the SHA-256 of the canonical parameters.
    #[arg(long)]
    pub hash: bool,
}

pub fn run(args: &ParamsArgs) -> Result<(), Box<dyn Error>> {
    let config = ExperimentConfig::from_path(&args.experiment)
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    let params = config
        .optimiser_params()
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    if args.hash {
        let digest = stable_hash_string(&params).map_err(|err| Box::new(err) as Box<dyn Error>)?;
        println!("{digest}");
        return Ok(());
    }
    let json = to_canonical_json_bytes(&params).map_err(|err| Box::new(err) as Box<dyn Error>)?;
    println!("{}", String::from_utf8(json)?);
    Ok(())
}
