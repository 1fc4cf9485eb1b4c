pub mod check;
pub mod poison;
pub mod predict;
pub mod runs;
pub mod serve;
pub mod sweep;

use std::error::Error;
use std::path::Path;

use lfb_core::ModelVersion;
use lfb_exp::{load_config, open_tracker, ExperimentConfig};
use lfb_model::LogisticRegression;
use lfb_serve::ModelServer;

/// Loads the experiment config, treating any failure as fatal.
pub fn experiment(path: &Path) -> Result<ExperimentConfig, Box<dyn Error>> {
    load_config(path).map_err(|err| Box::new(err) as Box<dyn Error>)
}

/// Resolves a registered model from the configured tracker.
pub fn start_server(
    config: &ExperimentConfig,
    model: Option<&str>,
    version: ModelVersion,
) -> Result<ModelServer, Box<dyn Error>> {
    let tracker = open_tracker(&config.tracker)?;
    let classifier = LogisticRegression::new(config.model.clone());
    let name = model.unwrap_or(&config.sweep.model_name);
    let server = ModelServer::start(
        tracker.as_ref(),
        &classifier,
        name,
        version,
        config.dataset.features.clone(),
    )
    .map_err(|err| {
        tracing::error!(%err, model = name, "failed to load model");
        Box::new(err) as Box<dyn Error>
    })?;
    Ok(server)
}
