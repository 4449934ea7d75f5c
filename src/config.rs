//! Runtime configuration.
//!
//! Everything comes from environment variables with defaults, so a bare
//! `quake-map` run queries USGS and falls back to the bundled CSV.
//!
//! | Variable | Default |
//! |---|---|
//! | `QUAKE_CATALOG_URL` | USGS FDSN event query endpoint |
//! | `QUAKE_FALLBACK_CSV` | `data/usgs/major_earthquakes.csv` |
//! | `QUAKE_MIN_MAGNITUDE` | `6.0` |
//! | `QUAKE_WINDOW_YEARS` | `200` |
//! | `QUAKE_PAGE_SIZE` | `20000` |
//! | `QUAKE_HTTP_TIMEOUT_SECS` | `60` |
//! | `QUAKE_YEAR_FILTER` | `200` |
//! | `QUAKE_NORMALIZE_POLICY` | `lenient` (or `strict`) |
//! | `QUAKE_FAILURE_POLICY` | `retain` (or `clear`) |
//! | `QUAKE_BASEMAP` | unset (GeoJSON country polygons) |
//! | `QUAKE_OUTPUT` | `map.svg` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::{DEFAULT_PAGE_SIZE, USGS_QUERY_URL};
use crate::error::{QuakeError, Result};
use crate::fallback::LoadParams;
use crate::record::NormalizePolicy;
use crate::session::FailurePolicy;

pub const DEFAULT_FALLBACK_CSV: &str = "data/usgs/major_earthquakes.csv";

#[derive(Debug, Clone)]
pub struct QuakeConfig {
    pub catalog_url: String,
    pub fallback_csv: PathBuf,
    pub load: LoadParams,
    pub page_size: usize,
    pub http_timeout: Duration,
    pub year_filter: i32,
    pub failure_policy: FailurePolicy,
    pub basemap: Option<PathBuf>,
    pub output: PathBuf,
}

impl Default for QuakeConfig {
    fn default() -> Self {
        Self {
            catalog_url: USGS_QUERY_URL.to_owned(),
            fallback_csv: PathBuf::from(DEFAULT_FALLBACK_CSV),
            load: LoadParams::default(),
            page_size: DEFAULT_PAGE_SIZE,
            http_timeout: Duration::from_secs(60),
            year_filter: 200,
            failure_policy: FailurePolicy::RetainPrevious,
            basemap: None,
            output: PathBuf::from("map.svg"),
        }
    }
}

impl QuakeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(url) = get("QUAKE_CATALOG_URL") {
            cfg.catalog_url = url;
        }
        if let Some(path) = get("QUAKE_FALLBACK_CSV") {
            cfg.fallback_csv = PathBuf::from(path);
        }
        if let Some(v) = get("QUAKE_MIN_MAGNITUDE") {
            cfg.load.min_magnitude = parse("QUAKE_MIN_MAGNITUDE", &v)?;
            if !cfg.load.min_magnitude.is_finite() {
                return Err(QuakeError::Config(format!(
                    "QUAKE_MIN_MAGNITUDE must be a finite number, got {v}"
                )));
            }
        }
        if let Some(v) = get("QUAKE_WINDOW_YEARS") {
            cfg.load.window_years = parse("QUAKE_WINDOW_YEARS", &v)?;
        }
        if let Some(v) = get("QUAKE_PAGE_SIZE") {
            cfg.page_size = parse("QUAKE_PAGE_SIZE", &v)?;
            if cfg.page_size == 0 {
                return Err(QuakeError::Config("QUAKE_PAGE_SIZE must be positive".into()));
            }
        }
        if let Some(v) = get("QUAKE_HTTP_TIMEOUT_SECS") {
            cfg.http_timeout = Duration::from_secs(parse("QUAKE_HTTP_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("QUAKE_YEAR_FILTER") {
            cfg.year_filter = parse("QUAKE_YEAR_FILTER", &v)?;
        }
        if let Some(v) = get("QUAKE_NORMALIZE_POLICY") {
            cfg.load.policy = match v.to_ascii_lowercase().as_str() {
                "lenient" => NormalizePolicy::Lenient,
                "strict" => NormalizePolicy::Strict,
                other => {
                    return Err(QuakeError::Config(format!(
                        "invalid QUAKE_NORMALIZE_POLICY: {other} (expected lenient or strict)"
                    )))
                }
            };
        }
        if let Some(v) = get("QUAKE_FAILURE_POLICY") {
            cfg.failure_policy = match v.to_ascii_lowercase().as_str() {
                "retain" => FailurePolicy::RetainPrevious,
                "clear" => FailurePolicy::Clear,
                other => {
                    return Err(QuakeError::Config(format!(
                        "invalid QUAKE_FAILURE_POLICY: {other} (expected retain or clear)"
                    )))
                }
            };
        }
        cfg.basemap = get("QUAKE_BASEMAP").map(PathBuf::from);
        if let Some(path) = get("QUAKE_OUTPUT") {
            cfg.output = PathBuf::from(path);
        }

        Ok(cfg)
    }
}

fn parse<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| QuakeError::Config(format!("invalid {name}: {e}")))
}
