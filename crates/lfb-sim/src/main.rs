use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    check::{self, CheckArgs},
    poison::{self, PoisonArgs},
    predict::{self, PredictArgs},
    runs::{self, RunsArgs},
    serve::{self, ServeArgs},
    sweep::{self, SweepArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "lfb-sim", about = "Label-flip poisoning benchmark CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the poison-level by hyperparameter sweep described by a config.
    Sweep(SweepArgs),
    /// Flip a fraction of the labels in a CSV file.
    Poison(PoisonArgs),
    /// Predict one feature row with a registered model.
    Predict(PredictArgs),
    /// Answer JSON-lines prediction requests on stdin/stdout.
    Serve(ServeArgs),
    /// Validate the dataset and the latest registered model.
    Check(CheckArgs),
    /// List recorded tracker runs.
    Runs(RunsArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Sweep(args) => sweep::run(&args),
        Command::Poison(args) => poison::run(&args),
        Command::Predict(args) => predict::run(&args),
        Command::Serve(args) => serve::run(&args),
        Command::Check(args) => check::run(&args),
        Command::Runs(args) => runs::run(&args),
    }
}
