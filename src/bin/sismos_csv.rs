//! One-shot export: fetch recent events, filter them and write the CSV.
//!
//! KPIs go to stderr so stdout can be piped straight into a file.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use sismo_watch::aggregate::ColorMode;
use sismo_watch::export::to_delimited_text;
use sismo_watch::filter::FilterSpec;
use sismo_watch::ingest::config::load_config_default;
use sismo_watch::ingest::providers::GaelProvider;
use sismo_watch::ingest::types::EventSource;
use sismo_watch::pipeline::run_once;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Minimum magnitude (inclusive).
    #[arg(short = 'm', long)]
    min_magnitude: Option<f64>,
    /// Maximum event age in days.
    #[arg(short, long)]
    days: Option<u32>,
    /// Ignore the day window entirely.
    #[arg(long, conflicts_with = "days")]
    all_days: bool,
    /// Case-insensitive text to look for in the geographic reference.
    #[arg(short, long)]
    keyword: Option<String>,
    /// Colour buckets by depth or magnitude.
    #[arg(long, value_parser = parse_color_mode)]
    color_by: Option<ColorMode>,
    /// Read the payload from a saved JSON file instead of the API.
    #[arg(long)]
    fixture: Option<PathBuf>,
    /// Output file (stdout when omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_color_mode(s: &str) -> Result<ColorMode, String> {
    serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
        .map_err(|_| format!("expected 'depth' or 'magnitude', got {s:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    sismo_watch::init_tracing();
    let cli = Cli::parse();
    let cfg = load_config_default().context("loading configuration")?;

    let defaults = cfg.default_filter();
    let spec = FilterSpec {
        min_magnitude: cli.min_magnitude.unwrap_or(defaults.min_magnitude),
        max_age_days: if cli.all_days {
            None
        } else {
            cli.days.or(defaults.max_age_days)
        },
        keyword: cli.keyword,
    };
    spec.validate()?;

    let mut opts = cfg.aggregate_options()?;
    if let Some(mode) = cli.color_by {
        opts.color_mode = mode;
    }

    let source: Box<dyn EventSource> = match &cli.fixture {
        Some(path) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("reading fixture {}", path.display()))?;
            Box::new(GaelProvider::from_fixture_str(&body))
        }
        None => Box::new(
            GaelProvider::from_url(cfg.endpoint.clone(), cfg.timeout())
                .context("building http client")?,
        ),
    };

    let snap = run_once(source.as_ref(), &spec, &opts, Utc::now()).await?;
    let bytes = to_delimited_text(&snap.records)?;

    match &cli.output {
        Some(path) => std::fs::write(path, &bytes)
            .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout().write_all(&bytes)?,
    }

    let fmt_opt = |v: Option<f64>| v.map_or_else(|| "—".to_string(), |x| format!("{x:.2}"));
    eprintln!(
        "events={} skipped={} mean_mag={} max_mag={} mean_depth_km={} days={}",
        snap.kpis.count,
        snap.skipped,
        fmt_opt(snap.kpis.mean_magnitude),
        fmt_opt(snap.kpis.max_magnitude),
        fmt_opt(snap.kpis.mean_depth_km),
        snap.kpis.trend.len(),
    );
    Ok(())
}
