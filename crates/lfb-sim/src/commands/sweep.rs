use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Args;
use lfb_data::{load_csv, split};
use lfb_exp::{open_tracker, run_sweep, to_canonical_json_bytes, SweepReport};
use lfb_model::LogisticRegression;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// YAML experiment configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Directory receiving `sweep_report.json`; the report goes to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Overrides the configured master seed.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: &SweepArgs) -> Result<(), Box<dyn Error>> {
    let config = super::experiment(&args.config)?;
    let seed = args.seed.unwrap_or(config.seed);
    let dataset = load_csv(&config.dataset)?;
    let data = split(&dataset, config.dataset.test_fraction, config.dataset.split_seed)?;
    tracing::info!(
        train = data.train.len(),
        eval = data.eval.len(),
        "split dataset into training and clean evaluation partitions"
    );

    let classifier = LogisticRegression::new(config.model.clone());
    let mut tracker = open_tracker(&config.tracker)?;
    let mut report = run_sweep(&config.sweep, &data, &classifier, tracker.as_mut(), seed)
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    report.provenance.created_at = Utc::now().to_rfc3339();

    match &args.out {
        Some(out) => persist_report(out, &report)?,
        None => {
            let bytes = to_canonical_json_bytes(&report)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn persist_report(out: &Path, report: &SweepReport) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(out)?;
    let bytes = to_canonical_json_bytes(report).map_err(|err| Box::new(err) as Box<dyn Error>)?;
    let path = out.join("sweep_report.json");
    fs::write(&path, bytes)?;
    tracing::info!(
        path = %path.display(),
        completed = report.completed(),
        failed = report.failed(),
        "wrote sweep report"
    );
    Ok(())
}
