//! # Aggregator
//! Colour buckets for the map plus the KPI block and daily trend series
//! consumed by the dashboard.
//!
//! Breakpoints are fixed constants so the same value always lands in the same
//! bucket, independent of whatever palette the front-end draws with.

use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::ingest::types::SeismicRecord;
use crate::rolling::{rolling_means, DEFAULT_ROLLING_WINDOW};

/// Depth breakpoints in km: shallow | intermediate | deep | very deep.
pub const DEPTH_BREAKS_KM: [f64; 3] = [35.0, 70.0, 300.0];
/// Magnitude breakpoints: low | moderate | high.
pub const MAGNITUDE_BREAKS: [f64; 2] = [3.0, 5.0];
/// Map centre when there is nothing to average (Santiago).
pub const FALLBACK_CENTER: GeoPoint = GeoPoint {
    latitude: -33.45,
    longitude: -70.66,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    #[serde(alias = "profundidad")]
    Depth,
    #[serde(alias = "magnitud")]
    Magnitude,
}

impl ColorMode {
    pub fn buckets(self) -> &'static [ColorBucket] {
        match self {
            ColorMode::Depth => &[
                ColorBucket::Shallow,
                ColorBucket::Intermediate,
                ColorBucket::Deep,
                ColorBucket::VeryDeep,
            ],
            ColorMode::Magnitude => &[
                ColorBucket::Low,
                ColorBucket::Moderate,
                ColorBucket::High,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBucket {
    Shallow,
    Intermediate,
    Deep,
    VeryDeep,
    Low,
    Moderate,
    High,
}

impl ColorBucket {
    pub fn for_depth(depth_km: f64) -> Self {
        if depth_km < DEPTH_BREAKS_KM[0] {
            ColorBucket::Shallow
        } else if depth_km < DEPTH_BREAKS_KM[1] {
            ColorBucket::Intermediate
        } else if depth_km < DEPTH_BREAKS_KM[2] {
            ColorBucket::Deep
        } else {
            ColorBucket::VeryDeep
        }
    }

    pub fn for_magnitude(magnitude: f64) -> Self {
        if magnitude < MAGNITUDE_BREAKS[0] {
            ColorBucket::Low
        } else if magnitude < MAGNITUDE_BREAKS[1] {
            ColorBucket::Moderate
        } else {
            ColorBucket::High
        }
    }

    pub fn classify(rec: &SeismicRecord, mode: ColorMode) -> Self {
        match mode {
            ColorMode::Depth => Self::for_depth(rec.depth_km),
            ColorMode::Magnitude => Self::for_magnitude(rec.magnitude),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColorBucket::Shallow => "shallow",
            ColorBucket::Intermediate => "intermediate",
            ColorBucket::Deep => "deep",
            ColorBucket::VeryDeep => "very_deep",
            ColorBucket::Low => "low",
            ColorBucket::Moderate => "moderate",
            ColorBucket::High => "high",
        }
    }

    /// Marker colour for the map layer.
    pub fn hex(self) -> &'static str {
        match self {
            ColorBucket::Shallow | ColorBucket::Low => "#4CAF50",
            ColorBucket::Intermediate => "#FFC107",
            ColorBucket::Deep | ColorBucket::Moderate => "#FF9800",
            ColorBucket::VeryDeep | ColorBucket::High => "#E53935",
        }
    }
}

impl FromStr for ColorBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [ColorBucket; 7] = [
            ColorBucket::Shallow,
            ColorBucket::Intermediate,
            ColorBucket::Deep,
            ColorBucket::VeryDeep,
            ColorBucket::Low,
            ColorBucket::Moderate,
            ColorBucket::High,
        ];
        ALL.into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| format!("unknown color bucket {s:?}"))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub color_mode: ColorMode,
    /// Zone whose calendar days define the trend buckets.
    pub timezone: Tz,
    pub rolling_window: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Depth,
            timezone: chrono_tz::America::Santiago,
            rolling_window: DEFAULT_ROLLING_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub bucket: ColorBucket,
    pub color: String,
    pub count: usize,
}

/// One calendar day of the trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub count: usize,
    /// `None` on days without events.
    pub mean_magnitude: Option<f64>,
    pub rolling_mean_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub count: usize,
    pub mean_magnitude: Option<f64>,
    pub median_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    pub mean_depth_km: Option<f64>,
    pub map_center: GeoPoint,
    pub color_mode: ColorMode,
    pub buckets: Vec<BucketCount>,
    pub trend: Vec<TrendPoint>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Daily counts over `[first day, last day]`, zero-filled.
pub fn daily_trend(records: &[SeismicRecord], tz: Tz, rolling_window: usize) -> Vec<TrendPoint> {
    if records.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&SeismicRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let day_of = |r: &SeismicRecord| r.timestamp.with_timezone(&tz).date_naive();
    let first = day_of(sorted[0]);
    let last = day_of(sorted[sorted.len() - 1]);
    let n_days = usize::try_from((last - first).num_days()).unwrap_or(0) + 1;

    let mut counts = vec![0usize; n_days];
    let mut mag_sums = vec![0.0f64; n_days];
    for r in &sorted {
        let idx = usize::try_from((day_of(*r) - first).num_days()).unwrap_or(0);
        counts[idx] += 1;
        mag_sums[idx] += r.magnitude;
    }

    let rolling = rolling_means(&counts, rolling_window);
    (0..n_days)
        .map(|i| TrendPoint {
            day: first + Duration::days(i as i64),
            count: counts[i],
            mean_magnitude: (counts[i] > 0).then(|| mag_sums[i] / counts[i] as f64),
            rolling_mean_count: rolling[i],
        })
        .collect()
}

/// Annotate each record with its colour bucket and compute the KPI block.
///
/// Output records keep input order.
pub fn aggregate(records: &[SeismicRecord], opts: &AggregateOptions) -> (Vec<SeismicRecord>, Kpis) {
    let enriched: Vec<SeismicRecord> = records
        .iter()
        .map(|r| SeismicRecord {
            color_bucket: Some(ColorBucket::classify(r, opts.color_mode)),
            ..r.clone()
        })
        .collect();

    let buckets = opts
        .color_mode
        .buckets()
        .iter()
        .map(|&b| BucketCount {
            bucket: b,
            color: b.hex().to_string(),
            count: enriched
                .iter()
                .filter(|r| r.color_bucket == Some(b))
                .count(),
        })
        .collect();

    let map_center = match (
        mean(records.iter().map(|r| r.latitude)),
        mean(records.iter().map(|r| r.longitude)),
    ) {
        (Some(latitude), Some(longitude)) => GeoPoint {
            latitude,
            longitude,
        },
        _ => FALLBACK_CENTER,
    };

    let kpis = Kpis {
        count: records.len(),
        mean_magnitude: mean(records.iter().map(|r| r.magnitude)),
        median_magnitude: median(records.iter().map(|r| r.magnitude).collect()),
        max_magnitude: records.iter().map(|r| r.magnitude).reduce(f64::max),
        mean_depth_km: mean(records.iter().map(|r| r.depth_km)),
        map_center,
        color_mode: opts.color_mode,
        buckets,
        trend: daily_trend(records, opts.timezone, opts.rolling_window),
    };

    (enriched, kpis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn rec_at(ts: DateTime<Utc>, mag: f64, depth: f64) -> SeismicRecord {
        SeismicRecord {
            timestamp: ts,
            magnitude: mag,
            depth_km: depth,
            latitude: -30.0,
            longitude: -71.0,
            reference: String::new(),
            color_bucket: None,
        }
    }

    #[test]
    fn depth_breakpoints_are_half_open() {
        assert_eq!(ColorBucket::for_depth(0.0), ColorBucket::Shallow);
        assert_eq!(ColorBucket::for_depth(34.9), ColorBucket::Shallow);
        assert_eq!(ColorBucket::for_depth(35.0), ColorBucket::Intermediate);
        assert_eq!(ColorBucket::for_depth(70.0), ColorBucket::Deep);
        assert_eq!(ColorBucket::for_depth(299.9), ColorBucket::Deep);
        assert_eq!(ColorBucket::for_depth(300.0), ColorBucket::VeryDeep);
    }

    #[test]
    fn magnitude_breakpoints_are_half_open() {
        assert_eq!(ColorBucket::for_magnitude(2.9), ColorBucket::Low);
        assert_eq!(ColorBucket::for_magnitude(3.0), ColorBucket::Moderate);
        assert_eq!(ColorBucket::for_magnitude(5.0), ColorBucket::High);
    }

    #[test]
    fn bucket_names_parse_back() {
        for b in ColorMode::Depth.buckets().iter().chain(ColorMode::Magnitude.buckets()) {
            assert_eq!(b.as_str().parse::<ColorBucket>().unwrap(), *b);
        }
        assert!("purple".parse::<ColorBucket>().is_err());
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn trend_uses_local_days() {
        // 02:00 UTC on the 5th is still the 4th in Santiago (UTC-3 in March).
        let tz = chrono_tz::America::Santiago;
        let rs = vec![
            rec_at(Utc.with_ymd_and_hms(2024, 3, 5, 2, 0, 0).unwrap(), 3.0, 10.0),
            rec_at(Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap(), 5.0, 10.0),
        ];
        let t = daily_trend(&rs, tz, 3);
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].day, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(t[0].count, 1);
        assert_eq!(t[1].mean_magnitude, Some(5.0));
    }

    #[test]
    fn aggregate_keeps_input_order() {
        let a = rec_at(Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap(), 4.0, 100.0);
        let b = rec_at(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), 2.0, 5.0);
        let (out, kpis) = aggregate(&[a.clone(), b.clone()], &AggregateOptions::default());
        assert_eq!(out[0].timestamp, a.timestamp);
        assert_eq!(out[0].color_bucket, Some(ColorBucket::Deep));
        assert_eq!(out[1].color_bucket, Some(ColorBucket::Shallow));
        assert_eq!(kpis.max_magnitude, Some(4.0));
        assert_eq!(kpis.trend.len(), 9);
        assert_eq!(kpis.buckets.len(), 4);
    }
}
