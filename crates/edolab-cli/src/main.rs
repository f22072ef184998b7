use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    params::{self, ParamsArgs},
    summarise::{self, SummariseArgs},
    synth::{self, SynthArgs},
    version::{self, VersionArgs},
};

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "edolab", about = "Summarise evolutionary dataset optimisation experiments")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise every trial of an experiment and write representatives.
    Summarise(SummariseArgs),
    /// Print the resolved optimiser arguments and families as JSON.
    Params(ParamsArgs),
    /// Write a synthetic trial tree for an experiment.
    Synth(SynthArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match cli.command {
        Command::Summarise(args) => summarise::run(&args),
        Command::Params(args) => params::run(&args),
        Command::Synth(args) => synth::run(&args),
        Command::Version(args) => version::run(&args),
    }
}
