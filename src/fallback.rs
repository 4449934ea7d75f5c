//! Remote-first loading with a static CSV behind it.
//!
//! One load cycle takes exactly one path: the catalog when it answers with
//! at least one feature, otherwise the tabular fallback. Results are never
//! merged.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use chrono::{DateTime, Months, Utc};
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogTransport, FetchProgress, QueryWindow};
use crate::error::{QuakeError, Result};
use crate::record::{
    normalize_features, normalize_tabular, write_tabular, EventRecord, NormalizePolicy, Normalized,
};

/// Where the active collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Remote,
    Fallback,
}

/// A finished load cycle.
#[derive(Debug, Clone)]
pub struct LoadedCollection {
    pub origin: DataOrigin,
    pub records: Vec<EventRecord>,
    pub dropped: usize,
}

/// Supplies the static tabular dataset.
pub trait TabularSource {
    fn describe(&self) -> String;
    /// Raw bytes; decoding happens per row during normalization.
    fn load(&self) -> Result<Vec<u8>>;
}

/// CSV export on the local filesystem.
#[derive(Debug, Clone)]
pub struct CsvFile {
    pub path: PathBuf,
}

impl CsvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> QuakeError {
        QuakeError::Fallback {
            path: self.describe(),
            source,
        }
    }

    /// Replace the file with `records`, writing a sibling temp file first
    /// and renaming it into place. The temp file never outlives a failure.
    pub fn replace(&self, records: &[EventRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("csv.tmp");
        let written = File::create(&tmp)
            .map_err(|e| self.io_error(e))
            .and_then(|file| write_tabular(records, BufWriter::new(file)))
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e)));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }
}

impl TabularSource for CsvFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| self.io_error(e))
    }
}

/// Query span and magnitude floor for the remote path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadParams {
    pub window_years: u32,
    pub min_magnitude: f64,
    pub policy: NormalizePolicy,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            window_years: 200,
            min_magnitude: 6.0,
            policy: NormalizePolicy::Lenient,
        }
    }
}

impl LoadParams {
    /// `[now - window_years, now]` at the configured magnitude.
    pub fn window(&self, now: DateTime<Utc>) -> QueryWindow {
        let start = now
            .checked_sub_months(Months::new(self.window_years.saturating_mul(12)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        QueryWindow {
            start,
            end: now,
            min_magnitude: self.min_magnitude,
        }
    }
}

pub struct FallbackController<T, S> {
    catalog: Catalog<T>,
    fallback: S,
    params: LoadParams,
}

impl<T: CatalogTransport, S: TabularSource> FallbackController<T, S> {
    pub fn new(catalog: Catalog<T>, fallback: S, params: LoadParams) -> Self {
        Self {
            catalog,
            fallback,
            params,
        }
    }

    pub fn load(&self, on_progress: &mut dyn FnMut(FetchProgress)) -> Result<LoadedCollection> {
        self.load_at(Utc::now(), on_progress)
    }

    /// Run one load cycle against a fixed clock.
    pub fn load_at(
        &self,
        now: DateTime<Utc>,
        on_progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<LoadedCollection> {
        let remote_problem = match self.load_remote(now, on_progress) {
            Ok(loaded) => return Ok(loaded),
            Err(problem) => problem,
        };
        warn!(reason = %remote_problem, source = %self.fallback.describe(), "falling back to static dataset");

        self.load_fallback(now)
            .map_err(|err| QuakeError::AllSourcesFailed {
                remote: remote_problem,
                fallback: Box::new(err),
            })
    }

    /// Remote path. The error side is a description of why the fallback
    /// is needed, which includes an empty answer.
    fn load_remote(
        &self,
        now: DateTime<Utc>,
        on_progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<LoadedCollection, String> {
        let window = self.params.window(now);
        info!(
            start = %window.start,
            end = %window.end,
            min_magnitude = window.min_magnitude,
            regions = self.catalog.regions().len(),
            "fetching remote catalog"
        );
        let features = self
            .catalog
            .fetch_all(&window, on_progress)
            .map_err(|e| e.to_string())?;
        if features.is_empty() {
            return Err("catalog returned no events".to_owned());
        }

        let normalized =
            normalize_features(&features, self.params.policy, now).map_err(|e| e.to_string())?;
        Ok(collection(DataOrigin::Remote, normalized))
    }

    fn load_fallback(&self, now: DateTime<Utc>) -> Result<LoadedCollection> {
        let text = self.fallback.load()?;
        let normalized = normalize_tabular(&text, self.params.policy, now)?;
        Ok(collection(DataOrigin::Fallback, normalized))
    }
}

fn collection(origin: DataOrigin, normalized: Normalized) -> LoadedCollection {
    let loaded = LoadedCollection {
        origin,
        dropped: normalized.dropped.len(),
        records: normalized.records,
    };
    info!(?origin, records = loaded.records.len(), dropped = loaded.dropped, "load cycle complete");
    loaded
}
