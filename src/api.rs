use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::aggregate::{AggregateOptions, ColorMode, Kpis};
use crate::error::{FilterSpecError, PipelineError};
use crate::export::{to_delimited_text, DOWNLOAD_FILENAME};
use crate::filter::FilterSpec;
use crate::ingest::types::{EventSource, SeismicRecord};
use crate::pipeline::{run_once, Snapshot};

/// Shared, read-only service state. Requests never share fetched data.
#[derive(Clone)]
pub struct AppState {
    source: Arc<dyn EventSource>,
    defaults: FilterSpec,
    opts: AggregateOptions,
    /// Fixed reference clock (tests); wall clock when `None`.
    fixed_now: Option<DateTime<Utc>>,
}

impl AppState {
    pub fn new(source: Arc<dyn EventSource>, defaults: FilterSpec, opts: AggregateOptions) -> Self {
        Self {
            source,
            defaults,
            opts,
            fixed_now: None,
        }
    }

    pub fn with_fixed_now(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/sismos", get(sismos_json))
        .route("/api/sismos.csv", get(sismos_csv))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Filter inputs as the dashboard sends them; missing fields fall back to
/// the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct SismosQuery {
    pub min_magnitude: Option<f64>,
    pub max_age_days: Option<u32>,
    /// Drop the day window entirely; wins over `max_age_days`.
    pub all_days: Option<bool>,
    pub keyword: Option<String>,
    pub color_by: Option<ColorMode>,
}

impl SismosQuery {
    fn resolve(
        self,
        defaults: &FilterSpec,
        opts: &AggregateOptions,
    ) -> Result<(FilterSpec, AggregateOptions), FilterSpecError> {
        let spec = FilterSpec {
            min_magnitude: self.min_magnitude.unwrap_or(defaults.min_magnitude),
            max_age_days: match self.all_days {
                Some(true) => None,
                _ => self.max_age_days.or(defaults.max_age_days),
            },
            keyword: self.keyword.or_else(|| defaults.keyword.clone()),
        };
        spec.validate()?;
        let opts = AggregateOptions {
            color_mode: self.color_by.unwrap_or(opts.color_mode),
            ..*opts
        };
        Ok((spec, opts))
    }
}

#[derive(Debug, Serialize)]
struct RecordView {
    #[serde(flatten)]
    record: SeismicRecord,
    color: Option<&'static str>,
    local_time: String,
    day: String,
    hour: String,
    region: String,
}

impl RecordView {
    fn new(record: SeismicRecord, tz: Tz) -> Self {
        let lt = record.local_time(tz);
        Self {
            color: record.color_bucket.map(|b| b.hex()),
            local_time: lt.format("%Y-%m-%d %H:%M:%S").to_string(),
            day: lt.format("%Y-%m-%d").to_string(),
            hour: lt.format("%H:%M").to_string(),
            region: record.region(),
            record,
        }
    }
}

#[derive(Debug, Serialize)]
struct SnapshotView {
    records: Vec<RecordView>,
    kpis: Kpis,
    fetched: usize,
    skipped: usize,
    filter: FilterSpec,
    generated_at: DateTime<Utc>,
    /// Set when the upstream fetch failed and the dataset is an empty fallback.
    warning: Option<String>,
}

impl SnapshotView {
    fn new(snap: Snapshot, tz: Tz, warning: Option<String>) -> Self {
        Self {
            records: snap
                .records
                .into_iter()
                .map(|r| RecordView::new(r, tz))
                .collect(),
            kpis: snap.kpis,
            fetched: snap.fetched,
            skipped: snap.skipped,
            filter: snap.filter,
            generated_at: snap.generated_at,
            warning,
        }
    }
}

#[derive(Debug)]
enum ApiError {
    BadFilter(FilterSpecError),
    Upstream(PipelineError),
    Export(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadFilter(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Upstream(e @ PipelineError::Network(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Upstream(e @ PipelineError::Format(_)) => {
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            ApiError::Export(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

async fn sismos_json(
    State(state): State<AppState>,
    Query(q): Query<SismosQuery>,
) -> Result<Json<SnapshotView>, ApiError> {
    let (spec, opts) = q
        .resolve(&state.defaults, &state.opts)
        .map_err(ApiError::BadFilter)?;
    let now = state.now();

    match run_once(state.source.as_ref(), &spec, &opts, now).await {
        Ok(snap) => Ok(Json(SnapshotView::new(snap, opts.timezone, None))),
        Err(e @ PipelineError::Network(_)) => {
            tracing::warn!(error = %e, "serving empty dataset after fetch failure");
            let empty = Snapshot::empty(&spec, &opts, now);
            Ok(Json(SnapshotView::new(
                empty,
                opts.timezone,
                Some(format!("could not load data from the seismic API: {e}")),
            )))
        }
        Err(e) => {
            tracing::error!(error = %e, "upstream format changed; pipeline halted");
            Err(ApiError::Upstream(e))
        }
    }
}

async fn sismos_csv(
    State(state): State<AppState>,
    Query(q): Query<SismosQuery>,
) -> Result<Response, ApiError> {
    let (spec, opts) = q
        .resolve(&state.defaults, &state.opts)
        .map_err(ApiError::BadFilter)?;

    let snap = run_once(state.source.as_ref(), &spec, &opts, state.now())
        .await
        .map_err(ApiError::Upstream)?;
    let body = to_delimited_text(&snap.records).map_err(|e| ApiError::Export(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}
