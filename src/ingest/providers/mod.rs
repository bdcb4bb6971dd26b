// src/ingest/providers/mod.rs
pub mod gael;

pub use gael::{parse_envelope, GaelProvider};
