// src/ingest/providers/gael.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;

use crate::error::PipelineError;
use crate::ingest::types::{EventSource, RawEvent};

/// Public feed of recent Chilean earthquakes.
pub const DEFAULT_ENDPOINT: &str = "https://api.gael.cloud/general/public/sismos";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Object keys that may wrap the event array when the body is not a bare list.
const COLLECTION_KEYS: &[&str] = &["sismos", "events", "data", "features"];

pub struct GaelProvider {
    mode: Mode,
}

enum Mode {
    // Own copy so fixtures loaded at runtime work too.
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
    },
}

impl GaelProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    /// HTTP provider with a bounded per-request timeout.
    pub fn from_url(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sismo-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    async fn get_body(url: &str, client: &reqwest::Client) -> Result<String, PipelineError> {
        let resp = client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

/// Split the upstream body into raw events.
///
/// Accepts a top-level array, or an object carrying the array under one of
/// the known collection keys.
pub fn parse_envelope(body: &str) -> Result<Vec<RawEvent>, PipelineError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::Format(format!("body is not JSON: {e}")))?;

    let items = match v {
        Value::Array(items) => items,
        Value::Object(mut obj) => COLLECTION_KEYS
            .iter()
            .find_map(|k| match obj.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                PipelineError::Format("no event collection in response object".to_string())
            })?,
        other => {
            return Err(PipelineError::Format(format!(
                "expected a list of events, got {}",
                json_kind(&other)
            )))
        }
    };

    Ok(items.into_iter().map(RawEvent::from).collect())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl EventSource for GaelProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawEvent>, PipelineError> {
        let t0 = std::time::Instant::now();
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { url, client } => match Self::get_body(url, client).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, provider = "gael", "provider http error");
                    counter!("ingest_provider_errors_total").increment(1);
                    return Err(e);
                }
            },
        };

        let events = parse_envelope(&body).inspect_err(|e| {
            tracing::warn!(error = %e, provider = "gael", "provider format error");
            counter!("ingest_provider_errors_total").increment(1);
        })?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_fetch_ms").record(ms);
        counter!("ingest_events_total").increment(events.len() as u64);
        tracing::debug!(target: "ingest", events = events.len(), ms, "gael fetch done");
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "gael"
    }
}
