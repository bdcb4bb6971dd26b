//! Fetch → normalize → filter → aggregate, once per request.
//!
//! Every run owns its data: nothing fetched or computed here outlives the
//! returned [`Snapshot`].

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::aggregate::{aggregate, AggregateOptions, Kpis};
use crate::error::PipelineError;
use crate::filter::{filter, FilterSpec};
use crate::ingest::normalize;
use crate::ingest::types::{EventSource, RawEvent, SeismicRecord};
use crate::metrics::ensure_metrics_described;

/// Everything the presentation layer needs from one run.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub records: Vec<SeismicRecord>,
    pub kpis: Kpis,
    /// Raw events received from upstream.
    pub fetched: usize,
    /// Raw events dropped by the Normalizer (data-quality indicator).
    pub skipped: usize,
    pub filter: FilterSpec,
    pub generated_at: DateTime<Utc>,
}

impl Snapshot {
    /// Empty dataset, used when the fetch failed and there is nothing to show.
    pub fn empty(spec: &FilterSpec, opts: &AggregateOptions, now: DateTime<Utc>) -> Self {
        process(&[], spec, opts, now)
    }
}

/// Run the pure stages over an already fetched payload.
pub fn process(
    raw: &[RawEvent],
    spec: &FilterSpec,
    opts: &AggregateOptions,
    now: DateTime<Utc>,
) -> Snapshot {
    let normalized = normalize(raw);
    let filtered = filter(&normalized.records, spec, now);
    let (records, kpis) = aggregate(&filtered, opts);

    tracing::info!(
        target: "pipeline",
        fetched = raw.len(),
        valid = normalized.records.len(),
        skipped = normalized.skipped,
        kept = records.len(),
        "pipeline run"
    );

    Snapshot {
        records,
        kpis,
        fetched: raw.len(),
        skipped: normalized.skipped,
        filter: spec.clone(),
        generated_at: now,
    }
}

/// Fetch from `source` and run the whole chain.
///
/// Fetch failures are returned as-is; the caller decides between a warning
/// with an empty dataset and a hard error.
pub async fn run_once(
    source: &dyn EventSource,
    spec: &FilterSpec,
    opts: &AggregateOptions,
    now: DateTime<Utc>,
) -> Result<Snapshot, PipelineError> {
    ensure_metrics_described();

    let raw = source.fetch_latest().await?;
    let snap = process(&raw, spec, opts, now);

    counter!("ingest_skipped_total").increment(snap.skipped as u64);
    counter!("ingest_kept_total").increment(snap.records.len() as u64);
    gauge!("ingest_pipeline_last_run_ts").set(now.timestamp() as f64);

    Ok(snap)
}
