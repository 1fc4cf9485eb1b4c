use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::ModelVersion;
use lfb_data::load_csv;
use lfb_model::accuracy;
use serde_json::json;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// YAML experiment configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Accuracy the latest model must exceed on the full dataset.
    #[arg(long, default_value_t = 0.85)]
    pub threshold: f64,
    /// Expected number of columns in the dataset header.
    #[arg(long, default_value_t = 5)]
    pub columns: usize,
}

pub fn run(args: &CheckArgs) -> Result<(), Box<dyn Error>> {
    let config = super::experiment(&args.config)?;
    let dataset = load_csv(&config.dataset)?;
    if dataset.column_count() != args.columns {
        return Err(Box::new(LfbError::Dataset(
            ErrorInfo::new("check-columns", "dataset has an unexpected number of columns")
                .with_context("expected", args.columns.to_string())
                .with_context("found", dataset.column_count().to_string()),
        )));
    }
    tracing::info!(columns = dataset.column_count(), "dataset column check passed");

    let server = super::start_server(&config, None, ModelVersion::Latest)?;
    let predicted = server.predict_batch(dataset.features())?;
    let score = accuracy(&predicted, dataset.labels().labels())?;
    let summary = json!({
        "model": server.reference().uri(),
        "rows": dataset.len(),
        "accuracy": score,
        "threshold": args.threshold,
        "passed": score > args.threshold,
    });
    println!("{summary}");
    if score <= args.threshold {
        return Err(Box::new(LfbError::Model(
            ErrorInfo::new("check-accuracy", "model accuracy is not above the threshold")
                .with_context("accuracy", format!("{score:.4}"))
                .with_context("threshold", args.threshold.to_string()),
        )));
    }
    tracing::info!(accuracy = score, model = %server.reference(), "model accuracy check passed");
    Ok(())
}
