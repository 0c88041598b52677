use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::dataset;
use crate::error::PipelineError;
use crate::settings::{FeedMode, Settings};
use crate::transform::FlatRecord;

#[derive(Debug, Clone, Copy, Default)]
struct FeedSummary {
    fed: usize,
    failed: usize,
}

fn truncate_body(text: &str) -> String {
    let trimmed = text.trim();
    let max_len = 300usize;
    if trimmed.len() <= max_len {
        trimmed.to_string()
    } else {
        format!("{}...", &trimmed[..max_len])
    }
}

/// Document id for the store, taken from the configured key column of the
/// serialized row.
fn document_id(fields: &Value, key_field: &str) -> Result<String, PipelineError> {
    match fields.get(key_field) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(other) if !other.is_null() => Ok(other.to_string()),
        _ => Err(PipelineError::malformed(
            "document id",
            format!("key field {key_field:?} is missing or empty"),
        )),
    }
}

async fn put_document(
    client: &Client,
    base_url: &str,
    schema: &str,
    doc_id: &str,
    fields: &Value,
) -> Result<String, PipelineError> {
    let url = format!("{base_url}/document/v1/{schema}/{schema}/docid/{doc_id}");
    let response = client
        .post(&url)
        .json(&json!({ "fields": fields }))
        .send()
        .await
        .map_err(|err| {
            PipelineError::ExternalService(format!("feed request for {doc_id} failed: {err}"))
        })?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err(PipelineError::ExternalService(format!(
            "feed for {doc_id} returned {status}: {}",
            truncate_body(&body)
        )))
    }
}

async fn feed_record(
    client: &Client,
    settings: &Settings,
    record: &FlatRecord,
) -> Result<String, PipelineError> {
    let fields = serde_json::to_value(record)
        .map_err(|err| PipelineError::malformed("record", err.to_string()))?;
    let doc_id = document_id(&fields, &settings.key_field)?;
    put_document(
        client,
        &settings.search_url,
        settings.schema.schema_name(),
        &doc_id,
        &fields,
    )
    .await
}

/// Feed in `batch_size` chunks with a per-batch summary. Failed documents
/// are logged and skipped; the run continues.
async fn feed_by_batch(
    client: &Client,
    settings: &Settings,
    rows: &[FlatRecord],
) -> Result<FeedSummary> {
    let mut summary = FeedSummary::default();
    let total_batches = rows.len().div_ceil(settings.batch_size);
    for (index, batch) in rows.chunks(settings.batch_size).enumerate() {
        let mut fed = 0usize;
        let mut failed = 0usize;
        for record in batch {
            match feed_record(client, settings, record).await {
                Ok(_) => fed += 1,
                Err(err) => {
                    failed += 1;
                    warn!("{err}");
                }
            }
        }
        info!("batch {}/{total_batches}: {fed} ok, {failed} failed", index + 1);
        summary.fed += fed;
        summary.failed += failed;
    }
    Ok(summary)
}

fn apply_feed_progress_style(progress: &ProgressBar) {
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} {prefix:.bold} [{elapsed_precise}] [{bar:32.cyan/blue}] \
{pos}/{len} ({percent}%) {msg}",
    ) {
        progress.set_style(style.progress_chars("=> "));
    }
}

/// Feed one document at a time. With `feed_debug` every response body is
/// logged.
async fn feed_by_point(
    client: &Client,
    settings: &Settings,
    rows: &[FlatRecord],
) -> Result<FeedSummary> {
    let progress = ProgressBar::new(rows.len() as u64);
    progress.set_prefix("FEED");
    apply_feed_progress_style(&progress);

    let mut summary = FeedSummary::default();
    for record in rows {
        match feed_record(client, settings, record).await {
            Ok(body) => {
                if settings.feed_debug {
                    info!("fed doc {}: {}", record.generated_key, truncate_body(&body));
                }
                summary.fed += 1;
            }
            Err(err) => {
                summary.failed += 1;
                warn!("{err}");
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    Ok(summary)
}

/// Feed the whole dataset as a single pass with one summary.
async fn feed_frame(
    client: &Client,
    settings: &Settings,
    rows: &[FlatRecord],
) -> Result<FeedSummary> {
    let mut summary = FeedSummary::default();
    for record in rows {
        match feed_record(client, settings, record).await {
            Ok(_) => summary.fed += 1,
            Err(err) => {
                summary.failed += 1;
                warn!("{err}");
            }
        }
    }
    Ok(summary)
}

pub async fn run(settings: &Settings) -> Result<()> {
    if settings.feed_mode == FeedMode::Off {
        info!("feed disabled (feed_mode = off)");
        return Ok(());
    }

    let client = Client::builder()
        .pool_max_idle_per_host(settings.connections)
        .timeout(Duration::from_secs(settings.feed_timeout_secs))
        .build()
        .context("Failed creating HTTP client")?;

    let started = Instant::now();
    for input in settings.schema_inputs() {
        let dataset_path = settings.dataset_path(input);
        info!(
            "feeding {} into {} ({} mode)",
            dataset_path.display(),
            settings.search_url,
            settings.feed_mode
        );
        let file_started = Instant::now();
        let rows = dataset::read_dataset(&dataset_path)?;
        let summary = match settings.feed_mode {
            FeedMode::Batch => feed_by_batch(&client, settings, &rows).await?,
            FeedMode::Point => feed_by_point(&client, settings, &rows).await?,
            FeedMode::Frame => feed_frame(&client, settings, &rows).await?,
            FeedMode::Off => FeedSummary::default(),
        };
        info!(
            "fed {} documents ({} failed) from {} in {:.1}s",
            summary.fed,
            summary.failed,
            dataset_path.display(),
            file_started.elapsed().as_secs_f64()
        );
    }
    info!("feed finished in {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_prefers_string_keys() {
        let fields = json!({ "generated_key": "key-1", "address_id": 12345 });
        assert_eq!(document_id(&fields, "generated_key").unwrap(), "key-1");
        assert_eq!(document_id(&fields, "address_id").unwrap(), "12345");
    }

    #[test]
    fn document_id_rejects_missing_or_empty_keys() {
        let fields = json!({ "generated_key": "" });
        assert!(document_id(&fields, "generated_key").is_err());
        assert!(document_id(&fields, "other_key").is_err());
    }

    #[test]
    fn long_response_bodies_are_truncated_for_logs() {
        let body = "x".repeat(400);
        let truncated = truncate_body(&body);
        assert!(truncated.len() <= 303);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
