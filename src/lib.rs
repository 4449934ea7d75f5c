//! quake-map — load major earthquakes from the USGS catalog (or a static
//! CSV when the catalog is unreachable) and draw them on a world map.
//!
//! ```text
//! FallbackController ─▶ Catalog (two regions, paginated) ─▶ record normalizers
//!         │                                   └─ on failure: CSV fallback
//!         ▼
//!      Session ─▶ filter_by_age ─▶ EventView (SvgMap)
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod map;
pub mod record;
pub mod region;
pub mod session;

pub use catalog::{Catalog, CatalogTransport, FetchProgress, PageRequest, QueryWindow, UreqTransport};
pub use config::QuakeConfig;
pub use error::{QuakeError, Result};
pub use fallback::{CsvFile, DataOrigin, FallbackController, LoadParams, LoadedCollection, TabularSource};
pub use filter::filter_by_age;
pub use record::{EventRecord, NormalizePolicy};
pub use region::{BoundingRegion, DEFAULT_REGIONS};
pub use session::{EventView, FailurePolicy, LoadStatus, LoadToken, Session};

/// Install the stderr `tracing` subscriber used by the binaries.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Wire a controller to the real HTTP transport and CSV file from config.
pub fn controller_from_config(cfg: &QuakeConfig) -> FallbackController<UreqTransport, CsvFile> {
    let transport = UreqTransport::new(cfg.catalog_url.clone(), cfg.http_timeout);
    let catalog = Catalog::new(transport, cfg.page_size, DEFAULT_REGIONS.to_vec());
    FallbackController::new(catalog, CsvFile::new(cfg.fallback_csv.clone()), cfg.load)
}
