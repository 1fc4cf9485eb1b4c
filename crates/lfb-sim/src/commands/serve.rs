use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::Args;
use lfb_core::ModelVersion;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// YAML experiment configuration naming the tracker and feature columns.
    #[arg(long)]
    pub config: PathBuf,
    /// Registered model name; defaults to the configured sweep model.
    #[arg(long)]
    pub model: Option<String>,
    /// `latest` or a version number.
    #[arg(long, default_value = "latest")]
    pub version: ModelVersion,
}

pub fn run(args: &ServeArgs) -> Result<(), Box<dyn Error>> {
    let config = super::experiment(&args.config)?;
    let server = super::start_server(&config, args.model.as_deref(), args.version)?;
    tracing::info!(model = %server.reference(), "serving JSON-lines requests on stdin");
    let stdin = io::stdin();
    server.serve(stdin.lock(), io::stdout().lock())?;
    Ok(())
}
