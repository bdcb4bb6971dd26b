// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregate::{AggregateOptions, ColorMode};
use crate::filter::FilterSpec;
use crate::ingest::providers::gael::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
use crate::rolling::DEFAULT_ROLLING_WINDOW;

const ENV_PATH: &str = "SISMOS_CONFIG_PATH";
const ENV_ENDPOINT: &str = "SISMOS_ENDPOINT";
const ENV_TIMEOUT: &str = "SISMOS_TIMEOUT_SECS";
const ENV_BIND: &str = "BIND_ADDR";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_timezone() -> String {
    "America/Santiago".to_string()
}
fn default_min_magnitude() -> f64 {
    3.0
}
fn default_max_age_days() -> Option<u32> {
    Some(7)
}
fn default_rolling_window() -> usize {
    DEFAULT_ROLLING_WINDOW
}

/// Service configuration. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// IANA zone used for local days in the trend series.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_min_magnitude")]
    pub default_min_magnitude: f64,
    #[serde(default = "default_max_age_days")]
    pub default_max_age_days: Option<u32>,
    #[serde(default)]
    pub color_by: ColorMode,
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            bind_addr: default_bind_addr(),
            timezone: default_timezone(),
            default_min_magnitude: default_min_magnitude(),
            default_max_age_days: default_max_age_days(),
            color_by: ColorMode::default(),
            rolling_window: default_rolling_window(),
        }
    }
}

impl AppConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("invalid timezone {:?}: {e}", self.timezone))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Filter applied when a request leaves a field out.
    pub fn default_filter(&self) -> FilterSpec {
        FilterSpec {
            min_magnitude: self.default_min_magnitude,
            max_age_days: self.default_max_age_days,
            keyword: None,
        }
    }

    pub fn aggregate_options(&self) -> Result<AggregateOptions> {
        Ok(AggregateOptions {
            color_mode: self.color_by,
            timezone: self.tz()?,
            rolling_window: self.rolling_window.max(1),
        })
    }

    fn validate(self) -> Result<Self> {
        self.tz()?;
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        self.default_filter()
            .validate()
            .context("default filter values")?;
        Ok(self)
    }

    fn apply_env(mut self) -> Result<Self> {
        if let Ok(v) = std::env::var(ENV_ENDPOINT) {
            self.endpoint = v;
        }
        if let Ok(v) = std::env::var(ENV_TIMEOUT) {
            self.timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT}={v:?} is not a number"))?;
        }
        if let Ok(v) = std::env::var(ENV_BIND) {
            self.bind_addr = v;
        }
        Ok(self)
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())?.validate()
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $SISMOS_CONFIG_PATH
/// 2) config/sismos.toml
/// 3) config/sismos.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<AppConfig> {
    let base = if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/sismos.toml");
        let json_p = PathBuf::from("config/sismos.json");
        if toml_p.exists() {
            load_config_from(&toml_p)?
        } else if json_p.exists() {
            load_config_from(&json_p)?
        } else {
            AppConfig::default()
        }
    };
    base.apply_env()?.validate()
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "json" => serde_json::from_str(s).context("parsing JSON config"),
        "toml" => toml::from_str(s).context("parsing TOML config"),
        // No usable extension: JSON first, then TOML.
        _ => serde_json::from_str(s)
            .or_else(|_| toml::from_str(s))
            .map_err(|_| anyhow!("unsupported config format")),
    }
}
