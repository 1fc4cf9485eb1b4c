use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use lfb_core::ModelVersion;
use serde_json::json;

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// YAML experiment configuration naming the tracker and feature columns.
    #[arg(long)]
    pub config: PathBuf,
    /// Registered model name; defaults to the configured sweep model.
    #[arg(long)]
    pub model: Option<String>,
    /// `latest` or a version number.
    #[arg(long, default_value = "latest")]
    pub version: ModelVersion,
    /// Comma separated feature values in configured column order.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub features: Vec<f64>,
}

pub fn run(args: &PredictArgs) -> Result<(), Box<dyn Error>> {
    let config = super::experiment(&args.config)?;
    let server = super::start_server(&config, args.model.as_deref(), args.version)?;
    let prediction = server.predict(&args.features)?;
    let output = json!({
        "model": server.reference().uri(),
        "prediction": prediction,
    });
    println!("{output}");
    Ok(())
}
