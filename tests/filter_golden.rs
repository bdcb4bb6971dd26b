// tests/filter_golden.rs
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use sismo_watch::filter::{filter, FilterSpec};
use sismo_watch::ingest::normalize;
use sismo_watch::ingest::providers::parse_envelope;
use sismo_watch::ingest::types::SeismicRecord;

#[derive(Debug, Deserialize)]
struct Expected {
    timestamp: String,
    magnitude: f64,
    reference: String,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

fn records() -> Vec<SeismicRecord> {
    let body = std::fs::read_to_string("tests/fixtures/sismos_50.json").expect("fixture");
    normalize(&parse_envelope(&body).expect("envelope")).records
}

#[test]
fn valparaiso_golden_subset() {
    let spec = FilterSpec {
        min_magnitude: 4.5,
        max_age_days: Some(7),
        keyword: Some("Valparaíso".to_string()),
    };
    let got = filter(&records(), &spec, now());

    let expected: Vec<Expected> = serde_json::from_str(
        &std::fs::read_to_string("tests/fixtures/sismos_50_expected.json").expect("golden"),
    )
    .expect("golden json");

    assert_eq!(got.len(), expected.len(), "golden subset size");
    for (g, e) in got.iter().zip(&expected) {
        assert_eq!(g.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(), e.timestamp);
        assert_eq!(g.magnitude, e.magnitude);
        assert_eq!(g.reference, e.reference);
    }
}

#[test]
fn unbounded_spec_returns_input_unchanged() {
    let rs = records();
    assert_eq!(filter(&rs, &FilterSpec::unbounded(), now()), rs);
}

#[test]
fn magnitude_floor_is_sound_for_every_threshold() {
    let rs = records();
    for tenths in 0..=70 {
        let min = f64::from(tenths) / 10.0;
        let spec = FilterSpec {
            min_magnitude: min,
            ..FilterSpec::unbounded()
        };
        let out = filter(&rs, &spec, now());
        assert!(out.iter().all(|r| r.magnitude >= min), "threshold {min}");
        let expected = rs.iter().filter(|r| r.magnitude >= min).count();
        assert_eq!(out.len(), expected, "threshold {min}");
    }
}

#[test]
fn day_window_boundary() {
    let rs = records();
    let spec = FilterSpec {
        max_age_days: Some(7),
        ..FilterSpec::unbounded()
    };
    let out = filter(&rs, &spec, now());
    // 7d23h old is still inside, exactly 8d old is out.
    assert!(out.iter().any(|r| r.reference == "20 km al O de Valparaíso"));
    assert!(!out.iter().any(|r| r.reference == "22 km al O de Valparaíso"));
}
