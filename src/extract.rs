use std::{fs::File, io::BufReader, time::Instant};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::dataset;
use crate::settings::Settings;
use crate::transform;

/// Transform every configured raw extract into its tabular dataset.
pub fn run(settings: &Settings) -> Result<()> {
    let started = Instant::now();
    for input in &settings.inputs {
        let input_path = settings.input_path(input);
        info!("processing {}", input_path.display());

        let file = File::open(&input_path)
            .with_context(|| format!("Failed opening extract {}", input_path.display()))?;
        let raw_records: Vec<Value> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed parsing extract {}", input_path.display()))?;

        let (rows, summary) =
            transform::transform(&raw_records, input.entity, settings.cutoff_date);

        let out_path = settings.dataset_path(input);
        dataset::write_dataset(&out_path, &rows)?;
        info!(
            "wrote {} of {} records to {} ({} dropped, {} failed)",
            summary.emitted,
            summary.processed,
            out_path.display(),
            summary.dropped,
            summary.failed
        );
    }
    info!("extract finished in {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}
