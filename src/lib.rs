// src/lib.rs
// Public library surface for integration tests and the binaries.

pub mod aggregate;
pub mod api;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod rolling;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, AggregateOptions, ColorBucket, ColorMode, Kpis, TrendPoint};
pub use crate::api::{create_router, AppState};
pub use crate::error::{ExportError, FilterSpecError, PipelineError};
pub use crate::export::{from_delimited_text, to_delimited_text};
pub use crate::filter::{filter, FilterSpec};
pub use crate::ingest::types::{EventSource, RawEvent, SeismicRecord};
pub use crate::ingest::{normalize, NormalizeOutcome};
pub use crate::pipeline::{process, run_once, Snapshot};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the default filter; `LOG_FORMAT=json` switches to
/// JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sismo_watch=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}
