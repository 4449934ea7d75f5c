//! quake-map — load major earthquakes and render `map.svg`.
//!
//! Tries the USGS catalog over two antimeridian-safe regions first and
//! falls back to the static CSV when the catalog fails or returns nothing.
//! Only events at most `QUAKE_YEAR_FILTER` years old are drawn.

use std::fs;

use anyhow::Context;
use quake_map::map::SvgMap;
use quake_map::{controller_from_config, init_logging, LoadStatus, QuakeConfig, Session};
use serde_json::Value;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    init_logging();

    let cfg = QuakeConfig::from_env()?;
    info!(
        catalog = %cfg.catalog_url,
        fallback = %cfg.fallback_csv.display(),
        year_filter = cfg.year_filter,
        "configuration loaded"
    );

    let basemap: Option<Value> = match &cfg.basemap {
        Some(path) => match fs::read_to_string(path).map(|s| serde_json::from_str::<Value>(&s)) {
            Ok(Ok(geojson)) => Some(geojson),
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "basemap is not valid GeoJSON, drawing without it");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "basemap unreadable, drawing without it");
                None
            }
        },
        None => None,
    };

    let controller = controller_from_config(&cfg);
    let mut session = Session::new(cfg.year_filter, cfg.failure_policy);

    match session.refresh(&controller, &mut |_| {})? {
        LoadStatus::Applied { origin, records } => info!(?origin, records, "collection loaded"),
        LoadStatus::Stale => warn!("load result superseded"),
    }

    let mut map = SvgMap::new(basemap.as_ref());
    session.render(&mut map)?;

    let svg = map.to_svg();
    fs::write(&cfg.output, &svg).with_context(|| format!("writing {}", cfg.output.display()))?;
    info!(
        path = %cfg.output.display(),
        bytes = svg.len(),
        visible = map.visible_count(),
        total = session.records().len(),
        "map written"
    );
    Ok(())
}
