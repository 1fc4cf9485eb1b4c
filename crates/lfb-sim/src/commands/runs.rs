use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::Args;
use csv::Writer;
use lfb_exp::{query_runs, Query};

#[derive(Args, Debug)]
pub struct RunsArgs {
    /// YAML experiment configuration naming the tracker.
    #[arg(long)]
    pub config: PathBuf,
    /// Only list runs of this experiment.
    #[arg(long)]
    pub experiment: Option<String>,
    /// Maximum number of rows to print.
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn run(args: &RunsArgs) -> Result<(), Box<dyn Error>> {
    let config = super::experiment(&args.config)?;
    let query = Query {
        experiment: args.experiment.clone(),
        limit: args.limit,
    };
    let table = query_runs(&config.tracker, &query)?;
    let mut writer = Writer::from_writer(io::stdout().lock());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
