//! quake-snapshot — regenerate the static fallback CSV from the live catalog.
//!
//! Fetches both regions, normalizes, and writes `QUAKE_FALLBACK_CSV` via a
//! temp file that is renamed into place, so a failed run never leaves a
//! truncated fallback behind.

use anyhow::bail;
use chrono::Utc;
use quake_map::record::normalize_features;
use quake_map::{init_logging, Catalog, CsvFile, QuakeConfig, UreqTransport, DEFAULT_REGIONS};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = QuakeConfig::from_env()?;

    let now = Utc::now();
    let window = cfg.load.window(now);
    let catalog = Catalog::new(
        UreqTransport::new(cfg.catalog_url.clone(), cfg.http_timeout),
        cfg.page_size,
        DEFAULT_REGIONS.to_vec(),
    );

    info!(catalog = %cfg.catalog_url, "fetching remote catalog");
    let features = catalog.fetch_all(&window, &mut |_| {})?;
    if features.is_empty() {
        bail!("catalog returned no events; keeping the existing snapshot");
    }

    let normalized = normalize_features(&features, cfg.load.policy, now)?;
    info!(
        records = normalized.records.len(),
        dropped = normalized.dropped.len(),
        "normalized catalog"
    );

    let dest = CsvFile::new(cfg.fallback_csv.clone());
    dest.replace(&normalized.records)?;

    info!(path = %dest.path.display(), records = normalized.records.len(), "snapshot written");
    Ok(())
}
