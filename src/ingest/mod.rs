// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::ingest::types::{RawEvent, SeismicRecord};

const TIMESTAMP_KEYS: &[&str] = &["fecha", "fechautc", "time", "tiempo"];
const MAGNITUDE_KEYS: &[&str] = &["magnitud", "mag"];
const DEPTH_KEYS: &[&str] = &["profundidad", "prof", "depth"];
const LATITUDE_KEYS: &[&str] = &["latitud", "lat"];
const LONGITUDE_KEYS: &[&str] = &["longitud", "lon", "long"];
const REFERENCE_KEYS: &[&str] = &[
    "referencia",
    "referenciageografica",
    "ref",
    "refgeografica",
    "lugar",
    "place",
];

/// Largest magnitude accepted as physically plausible.
pub const MAX_MAGNITUDE: f64 = 10.0;

/// Calendar years accepted for event timestamps. Anything outside is an
/// upstream glitch and would blow up the daily trend.
pub const TIMESTAMP_YEARS: std::ops::RangeInclusive<i32> = 1900..=2100;

/// Result of one normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeOutcome {
    pub records: Vec<SeismicRecord>,
    /// Raw events dropped for missing or invalid fields.
    pub skipped: usize,
}

/// Why a raw event was dropped. Logged, never returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    Missing(&'static str),
    Unparseable(&'static str),
    OutOfRange(&'static str),
}

/// Normalize free text: decode entities, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Lenient numeric coercion: numbers as-is, strings by their first numeric
/// token ("5,3" -> 5.3, "65 km" -> 65.0).
pub fn coerce_f64(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            static RE_NUM: OnceCell<regex::Regex> = OnceCell::new();
            let re = RE_NUM
                .get_or_init(|| regex::Regex::new(r"[-+]?\d+(?:[.,]\d+)?").expect("static regex"));
            let m = re.find(s)?;
            m.as_str().replace(',', ".").parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|x| x.is_finite())
}

/// Parse an upstream timestamp into UTC.
/// Offset-less values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|naive| naive.and_utc())
}

fn required_f64(
    raw: &RawEvent,
    keys: &'static [&'static str],
    field: &'static str,
) -> Result<f64, SkipReason> {
    let v = raw.first_of(keys).ok_or(SkipReason::Missing(field))?;
    coerce_f64(v).ok_or(SkipReason::Unparseable(field))
}

fn normalize_one(raw: &RawEvent) -> Result<SeismicRecord, SkipReason> {
    let ts_value = raw
        .first_of(TIMESTAMP_KEYS)
        .ok_or(SkipReason::Missing("timestamp"))?;
    let timestamp = ts_value
        .as_str()
        .and_then(parse_timestamp)
        .ok_or(SkipReason::Unparseable("timestamp"))?;
    if !TIMESTAMP_YEARS.contains(&timestamp.year()) {
        return Err(SkipReason::OutOfRange("timestamp"));
    }

    let magnitude = required_f64(raw, MAGNITUDE_KEYS, "magnitude")?;
    if !(0.0..=MAX_MAGNITUDE).contains(&magnitude) {
        return Err(SkipReason::OutOfRange("magnitude"));
    }
    let depth_km = required_f64(raw, DEPTH_KEYS, "depth_km")?;
    if depth_km < 0.0 {
        return Err(SkipReason::OutOfRange("depth_km"));
    }
    let latitude = required_f64(raw, LATITUDE_KEYS, "latitude")?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(SkipReason::OutOfRange("latitude"));
    }
    let longitude = required_f64(raw, LONGITUDE_KEYS, "longitude")?;
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(SkipReason::OutOfRange("longitude"));
    }

    let reference = match raw.first_of(REFERENCE_KEYS) {
        Some(Value::String(s)) => normalize_text(s),
        Some(other) => normalize_text(&other.to_string()),
        None => String::new(),
    };

    Ok(SeismicRecord {
        timestamp,
        magnitude,
        depth_km,
        latitude,
        longitude,
        reference,
        color_bucket: None,
    })
}

/// Translate raw upstream events into validated records, preserving order.
pub fn normalize(raw_events: &[RawEvent]) -> NormalizeOutcome {
    let mut records = Vec::with_capacity(raw_events.len());
    let mut skipped = 0usize;

    for (idx, raw) in raw_events.iter().enumerate() {
        match normalize_one(raw) {
            Ok(rec) => records.push(rec),
            Err(reason) => {
                skipped += 1;
                tracing::debug!(target: "ingest", index = idx, ?reason, "skipping raw event");
            }
        }
    }

    NormalizeOutcome { records, skipped }
}

/// Inverse view of a record as a raw event, in the canonical field names.
/// Re-normalizing it yields the same record.
pub fn to_raw(rec: &SeismicRecord) -> RawEvent {
    let mut m = serde_json::Map::new();
    m.insert(
        "fecha".into(),
        Value::String(rec.timestamp.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
    );
    m.insert("magnitud".into(), Value::from(rec.magnitude));
    m.insert("profundidad".into(), Value::from(rec.depth_km));
    m.insert("latitud".into(), Value::from(rec.latitude));
    m.insert("longitud".into(), Value::from(rec.longitude));
    m.insert("referencia".into(), Value::String(rec.reference.clone()));
    RawEvent(m)
}
