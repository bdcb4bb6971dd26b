// src/ingest/types.rs
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aggregate::ColorBucket;
use crate::error::PipelineError;

/// One event object exactly as the upstream API returned it.
/// Discarded once the Normalizer has translated it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent(pub Map<String, Value>);

impl RawEvent {
    /// Case-insensitive field lookup (upstream capitalisation is not stable).
    pub fn get_ci(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// First present, non-null field among `aliases`.
    pub fn first_of(&self, aliases: &[&str]) -> Option<&Value> {
        aliases
            .iter()
            .filter_map(|a| self.get_ci(a))
            .find(|v| !v.is_null())
    }
}

impl From<Value> for RawEvent {
    fn from(v: Value) -> Self {
        match v {
            Value::Object(m) => RawEvent(m),
            _ => RawEvent::default(),
        }
    }
}

/// Canonical, range-validated seismic event.
///
/// Field order here is the column order of the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicRecord {
    pub timestamp: DateTime<Utc>,
    pub magnitude: f64,
    pub depth_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub reference: String,
    /// Set by the Aggregator only; `None` straight out of the Normalizer.
    pub color_bucket: Option<ColorBucket>,
}

impl SeismicRecord {
    /// Occurrence time in the given display zone.
    pub fn local_time(&self, tz: Tz) -> DateTime<Tz> {
        self.timestamp.with_timezone(&tz)
    }

    /// Region named in the reference ("Región de ..."), if any.
    pub fn region(&self) -> String {
        static RE_REGION: OnceCell<regex::Regex> = OnceCell::new();
        let re = RE_REGION.get_or_init(|| {
            regex::Regex::new(r"Región\s+del?\s+[\p{L}\s]+")
                .expect("static regex")
        });
        re.find(&self.reference)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| "No especificada".to_string())
    }
}

#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawEvent>, PipelineError>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn rec(reference: &str) -> SeismicRecord {
        SeismicRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 3, 30, 0).unwrap(),
            magnitude: 3.0,
            depth_km: 10.0,
            latitude: -36.8,
            longitude: -73.0,
            reference: reference.to_string(),
            color_bucket: None,
        }
    }

    #[test]
    fn region_is_extracted_from_reference() {
        assert_eq!(
            rec("25 km al NO de Lebu, Región del Biobío").region(),
            "Región del Biobío"
        );
        assert_eq!(rec("Región de Valparaíso").region(), "Región de Valparaíso");
        assert_eq!(rec("12 km al S de Arica").region(), "No especificada");
    }

    #[test]
    fn local_time_uses_display_zone() {
        // June: Chile on standard time, UTC-4.
        let lt = rec("").local_time(chrono_tz::America::Santiago);
        assert_eq!(lt.format("%Y-%m-%d %H:%M").to_string(), "2024-05-31 23:30");
    }

    #[test]
    fn lookup_ignores_key_case() {
        let raw = RawEvent::from(json!({"Magnitud": 3.2, "mag": null}));
        assert_eq!(raw.get_ci("MAGNITUD"), Some(&json!(3.2)));
        assert_eq!(raw.first_of(&["mag", "magnitud"]), Some(&json!(3.2)));
    }
}
