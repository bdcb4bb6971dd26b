// tests/ingest_normalize.rs
use serde_json::json;
use sismo_watch::ingest::providers::parse_envelope;
use sismo_watch::ingest::types::RawEvent;
use sismo_watch::ingest::{normalize, to_raw};

fn fixture() -> Vec<RawEvent> {
    let body = std::fs::read_to_string("tests/fixtures/sismos_50.json").expect("fixture");
    parse_envelope(&body).expect("fixture envelope")
}

#[test]
fn one_bad_magnitude_out_of_three_is_skipped() {
    let raw: Vec<RawEvent> = vec![
        json!({"Fecha": "2024-03-01 10:00:00", "Magnitud": "3.4", "Profundidad": "10 km",
               "Latitud": "-20.1", "Longitud": "-70.2", "RefGeografica": "30 km al O de Iquique"}),
        json!({"Fecha": "2024-03-01 11:00:00", "Magnitud": "N/A", "Profundidad": "10 km",
               "Latitud": "-20.1", "Longitud": "-70.2", "RefGeografica": "31 km al O de Iquique"}),
        json!({"Fecha": "2024-03-01 12:00:00", "Magnitud": "5,1", "Profundidad": "40 km",
               "Latitud": "-36.8", "Longitud": "-73.1", "RefGeografica": "Concepción"}),
    ]
    .into_iter()
    .map(RawEvent::from)
    .collect();

    let out = normalize(&raw);
    assert_eq!(out.records.len(), 2);
    assert_eq!(out.skipped, 1);
    // Source order survives.
    assert_eq!(out.records[0].magnitude, 3.4);
    assert_eq!(out.records[1].magnitude, 5.1);
}

#[test]
fn missing_required_field_is_skipped() {
    let raw = vec![RawEvent::from(json!({
        "Fecha": "2024-03-01 10:00:00", "Magnitud": "3.4", "Profundidad": "10 km",
        "Longitud": "-70.2"
    }))];
    let out = normalize(&raw);
    assert!(out.records.is_empty());
    assert_eq!(out.skipped, 1);
}

#[test]
fn fixture_has_two_malformed_rows() {
    let out = normalize(&fixture());
    assert_eq!(out.records.len(), 48);
    assert_eq!(out.skipped, 2);
    assert!(out.records.iter().all(|r| r.color_bucket.is_none()));
}

#[test]
fn renormalizing_valid_records_is_a_no_op() {
    let first = normalize(&fixture()).records;
    let raw_again: Vec<RawEvent> = first.iter().map(to_raw).collect();
    let second = normalize(&raw_again);
    assert_eq!(second.skipped, 0);
    assert_eq!(second.records, first);
}

#[test]
fn far_future_timestamp_does_not_reach_the_trend() {
    use chrono::{TimeZone, Utc};
    use sismo_watch::aggregate::{aggregate, AggregateOptions};
    use sismo_watch::filter::{filter, FilterSpec};

    let raw: Vec<RawEvent> = vec![
        json!({"fecha": "+20000-01-01 00:00:00", "magnitud": 4.0, "profundidad": 10,
               "latitud": -33.0, "longitud": -71.6, "referencia": "Valparaíso"}),
        json!({"fecha": "2024-03-09 10:00:00", "magnitud": 4.2, "profundidad": 15,
               "latitud": -33.1, "longitud": -71.7, "referencia": "Viña del Mar"}),
    ]
    .into_iter()
    .map(RawEvent::from)
    .collect();

    let out = normalize(&raw);
    assert_eq!(out.skipped, 1);
    assert_eq!(out.records.len(), 1);

    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let kept = filter(&out.records, &FilterSpec::default(), now);
    let (_, kpis) = aggregate(&kept, &AggregateOptions::default());
    assert_eq!(kpis.trend.len(), 1);
}
