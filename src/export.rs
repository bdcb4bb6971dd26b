//! CSV export of the filtered, enriched record set.
//!
//! Column order follows the field order of [`SeismicRecord`]. The header row
//! is written even when there are no records.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::aggregate::ColorBucket;
use crate::error::ExportError;
use crate::ingest::types::SeismicRecord;

pub const HEADER: [&str; 7] = [
    "timestamp",
    "magnitude",
    "depth_km",
    "latitude",
    "longitude",
    "reference",
    "color_bucket",
];

/// Suggested filename for browser downloads.
pub const DOWNLOAD_FILENAME: &str = "sismos_filtrados.csv";

fn row(r: &SeismicRecord) -> [String; 7] {
    [
        // RFC 3339 in UTC; fractional seconds only when present.
        r.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        format!("{:.3}", r.magnitude),
        format!("{:.3}", r.depth_km),
        format!("{:.4}", r.latitude),
        format!("{:.4}", r.longitude),
        r.reference.clone(),
        r.color_bucket
            .map(|b| b.as_str().to_string())
            .unwrap_or_default(),
    ]
}

/// Serialize records as UTF-8 CSV.
pub fn to_delimited_text(records: &[SeismicRecord]) -> Result<Vec<u8>, ExportError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(HEADER)?;
    for r in records {
        wtr.write_record(row(r))?;
    }
    wtr.into_inner().map_err(|e| ExportError::Buffer(e.to_string()))
}

fn parse_f64(row: usize, field: &'static str, value: &str) -> Result<f64, ExportError> {
    value.trim().parse().map_err(|_| ExportError::Field {
        row,
        field,
        value: value.to_string(),
    })
}

/// Read back a file produced by [`to_delimited_text`].
pub fn from_delimited_text(bytes: &[u8]) -> Result<Vec<SeismicRecord>, ExportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let header = rdr.headers()?.clone();
    if header.iter().ne(HEADER.iter().copied()) {
        return Err(ExportError::Field {
            row: 0,
            field: "header",
            value: header.iter().collect::<Vec<_>>().join(","),
        });
    }

    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let n = i + 1;
        let ts = DateTime::parse_from_rfc3339(&rec[0])
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ExportError::Field {
                row: n,
                field: "timestamp",
                value: rec[0].to_string(),
            })?;
        let color_bucket = match &rec[6] {
            "" => None,
            s => Some(s.parse::<ColorBucket>().map_err(|_| ExportError::Field {
                row: n,
                field: "color_bucket",
                value: s.to_string(),
            })?),
        };
        out.push(SeismicRecord {
            timestamp: ts,
            magnitude: parse_f64(n, "magnitude", &rec[1])?,
            depth_km: parse_f64(n, "depth_km", &rec[2])?,
            latitude: parse_f64(n, "latitude", &rec[3])?,
            longitude: parse_f64(n, "longitude", &rec[4])?,
            reference: rec[5].to_string(),
            color_bucket,
        });
    }
    Ok(out)
}
