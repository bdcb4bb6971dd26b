//! # Filter Engine
//! Magnitude floor, day window and reference keyword, combined with AND.
//!
//! Pure and non-destructive: the input slice is never touched and an empty
//! result is a normal outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FilterSpecError;
use crate::ingest::types::SeismicRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub min_magnitude: f64,
    /// Maximum age in whole days; `None` disables the window.
    pub max_age_days: Option<u32>,
    /// Case-insensitive substring of `reference`; `None`/blank disables it.
    pub keyword: Option<String>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            min_magnitude: 3.0,
            max_age_days: Some(7),
            keyword: None,
        }
    }
}

impl FilterSpec {
    /// Spec that keeps every record.
    pub fn unbounded() -> Self {
        Self {
            min_magnitude: 0.0,
            max_age_days: None,
            keyword: None,
        }
    }

    /// Check caller-supplied values before running a pipeline with them.
    pub fn validate(&self) -> Result<(), FilterSpecError> {
        if !self.min_magnitude.is_finite() || self.min_magnitude < 0.0 {
            return Err(FilterSpecError::InvalidMinMagnitude(self.min_magnitude));
        }
        Ok(())
    }

    /// Lower-cased, trimmed keyword if the condition is active.
    fn needle(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase)
    }
}

/// Age of `ts` in whole days relative to `now` (negative for future events).
pub fn age_days(now: DateTime<Utc>, ts: DateTime<Utc>) -> i64 {
    (now - ts).num_seconds().div_euclid(86_400)
}

/// Records satisfying every active condition of `spec`, in input order.
pub fn filter(records: &[SeismicRecord], spec: &FilterSpec, now: DateTime<Utc>) -> Vec<SeismicRecord> {
    let needle = spec.needle();

    let out: Vec<SeismicRecord> = records
        .iter()
        .filter(|r| r.magnitude >= spec.min_magnitude)
        .filter(|r| match spec.max_age_days {
            Some(max) => age_days(now, r.timestamp) <= i64::from(max),
            None => true,
        })
        .filter(|r| match &needle {
            Some(k) => r.reference.to_lowercase().contains(k.as_str()),
            None => true,
        })
        .cloned()
        .collect();

    tracing::debug!(
        target: "filter",
        input = records.len(),
        kept = out.len(),
        min_magnitude = spec.min_magnitude,
        max_age_days = ?spec.max_age_days,
        keyword = ?needle,
        "filter applied"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn rec(mag: f64, hours_ago: i64, reference: &str) -> SeismicRecord {
        SeismicRecord {
            timestamp: now() - Duration::hours(hours_ago),
            magnitude: mag,
            depth_km: 10.0,
            latitude: -33.0,
            longitude: -71.0,
            reference: reference.to_string(),
            color_bucket: None,
        }
    }

    #[test]
    fn unbounded_spec_is_identity() {
        let rs = vec![rec(0.0, 1, "a"), rec(7.2, 24 * 400, "b"), rec(3.3, -5, "")];
        assert_eq!(filter(&rs, &FilterSpec::unbounded(), now()), rs);
    }

    #[test]
    fn magnitude_floor_is_inclusive() {
        let rs = vec![rec(4.4, 1, ""), rec(4.5, 1, ""), rec(4.6, 1, "")];
        let spec = FilterSpec {
            min_magnitude: 4.5,
            ..FilterSpec::unbounded()
        };
        let out = filter(&rs, &spec, now());
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.magnitude >= 4.5));
    }

    #[test]
    fn very_low_floor_keeps_everything() {
        let rs = vec![rec(0.0, 1, ""), rec(9.0, 1, "")];
        let spec = FilterSpec {
            min_magnitude: f64::MIN,
            ..FilterSpec::unbounded()
        };
        assert_eq!(filter(&rs, &spec, now()).len(), 2);
    }

    #[test]
    fn zero_day_window_keeps_last_24h_only() {
        let rs = vec![rec(3.0, 0, ""), rec(3.0, 23, ""), rec(3.0, 24, ""), rec(3.0, 30, "")];
        let spec = FilterSpec {
            max_age_days: Some(0),
            ..FilterSpec::unbounded()
        };
        assert_eq!(filter(&rs, &spec, now()).len(), 2);
    }

    #[test]
    fn window_counts_whole_days() {
        let rs = vec![rec(3.0, 24 * 7 + 23, ""), rec(3.0, 24 * 8, "")];
        let spec = FilterSpec {
            max_age_days: Some(7),
            ..FilterSpec::unbounded()
        };
        assert_eq!(filter(&rs, &spec, now()).len(), 1);
    }

    #[test]
    fn keyword_is_case_insensitive_and_unicode_aware() {
        let rs = vec![
            rec(3.0, 1, "12 km al O de VALPARAÍSO"),
            rec(3.0, 1, "40 km al S de Valparaiso"),
            rec(3.0, 1, "Región de Valparaíso"),
        ];
        let spec = FilterSpec {
            keyword: Some("  valparaíso ".into()),
            ..FilterSpec::unbounded()
        };
        assert_eq!(filter(&rs, &spec, now()).len(), 2);
    }

    #[test]
    fn blank_keyword_disables_condition() {
        let rs = vec![rec(3.0, 1, "x"), rec(3.0, 1, "")];
        let spec = FilterSpec {
            keyword: Some("   ".into()),
            ..FilterSpec::unbounded()
        };
        assert_eq!(filter(&rs, &spec, now()).len(), 2);
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let rs = vec![rec(2.0, 1, "Arica")];
        let spec = FilterSpec {
            keyword: Some("Aysén".into()),
            ..FilterSpec::default()
        };
        assert!(filter(&rs, &spec, now()).is_empty());
        assert_eq!(rs.len(), 1);
    }

    #[test]
    fn validate_rejects_negative_and_nan() {
        assert!(FilterSpec::default().validate().is_ok());
        let mut s = FilterSpec::default();
        s.min_magnitude = -0.5;
        assert_eq!(
            s.validate(),
            Err(FilterSpecError::InvalidMinMagnitude(-0.5))
        );
        s.min_magnitude = f64::NAN;
        assert!(s.validate().is_err());
    }
}
