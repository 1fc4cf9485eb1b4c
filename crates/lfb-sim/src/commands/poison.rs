use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use lfb_core::{Label, LabelSeries, RngHandle};
use lfb_exp::{poison, PoisonLevel};
use serde_json::json;

#[derive(Args, Debug)]
pub struct PoisonArgs {
    /// CSV file with a header row.
    #[arg(long)]
    pub input: PathBuf,
    /// Column holding the labels to flip.
    #[arg(long, default_value = "species")]
    pub label: String,
    /// Fraction of labels to flip, in [0, 1].
    #[arg(long)]
    pub level: f64,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Destination CSV; only flipped label cells differ from the input.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &PoisonArgs) -> Result<(), Box<dyn Error>> {
    let level = PoisonLevel::new(args.level)?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(&args.input)?;
    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|name| name.trim() == args.label)
        .ok_or_else(|| format!("label column '{}' not found in {}", args.label, args.input.display()))?;
    let records = reader.records().collect::<Result<Vec<StringRecord>, _>>()?;

    let labels = LabelSeries::from_labels(
        records
            .iter()
            .map(|record| Label::new(record.get(column).unwrap_or_default().trim()))
            .collect(),
    );
    let mut rng = RngHandle::from_seed(args.seed);
    let outcome = poison(&labels, level, &mut rng);

    let mut writer = WriterBuilder::new().from_path(&args.out)?;
    writer.write_record(&headers)?;
    let series = outcome.series().labels();
    for (position, record) in records.iter().enumerate() {
        let flipped = outcome.flipped().binary_search(&position).is_ok();
        let row = record.iter().enumerate().map(|(idx, field)| {
            if flipped && idx == column {
                series[position].as_str()
            } else {
                field
            }
        });
        writer.write_record(row)?;
    }
    writer.flush()?;

    let summary = json!({
        "rows": labels.len(),
        "level": level.value(),
        "status": outcome.status(),
        "flipped": outcome.flipped(),
        "out": args.out.display().to_string(),
    });
    println!("{summary}");
    Ok(())
}
