//! Static SVG world map of the visible earthquakes.
//!
//! Equirectangular / plate carrée projection. Markers scale with magnitude
//! and are coloured by depth:
//!   red     (#ff0000) — shallower than 10 km
//!   orange  (#ff6600) — 10–50 km
//!   yellow  (#ffcc00) — 50–100 km
//!   green   (#00cc00) — 100–300 km
//!   blue    (#0000ff) — deeper

use std::fmt::Write as _;

use serde_json::Value;

use crate::record::EventRecord;
use crate::session::EventView;

const W: f64 = 1200.0;
const H: f64 = 600.0;

const OCEAN: &str = "#0c1a2e";

// (lat, lng) vertices, traced roughly along the plate boundaries.
const RING_OF_FIRE: &[(f64, f64)] = &[
    // North and Central America
    (60.0, -150.0), (55.0, -135.0), (50.0, -125.0), (45.0, -125.0), (40.0, -125.0),
    (35.0, -120.0), (30.0, -115.0), (25.0, -110.0), (20.0, -105.0), (15.0, -95.0),
    (10.0, -85.0),
    // Andes
    (5.0, -80.0), (0.0, -80.0), (-5.0, -80.0), (-10.0, -75.0), (-15.0, -75.0),
    (-20.0, -70.0), (-25.0, -70.0), (-30.0, -70.0), (-35.0, -70.0), (-40.0, -75.0),
    (-45.0, -75.0), (-50.0, -75.0), (-55.0, -70.0), (-60.0, -65.0),
    // New Zealand up to Papua New Guinea
    (-65.0, 170.0), (-60.0, 175.0), (-45.0, 170.0), (-40.0, 175.0), (-35.0, 175.0),
    (-30.0, 170.0), (-25.0, 165.0), (-20.0, 160.0), (-15.0, 155.0), (-10.0, 150.0),
    (-5.0, 145.0),
    // Philippines, Japan, Kamchatka
    (0.0, 140.0), (5.0, 135.0), (10.0, 125.0), (15.0, 120.0), (20.0, 125.0),
    (25.0, 125.0), (30.0, 130.0), (35.0, 140.0), (40.0, 145.0), (45.0, 150.0),
    (50.0, 155.0), (55.0, 160.0), (60.0, 165.0),
    // Aleutians
    (55.0, 170.0), (55.0, 180.0), (55.0, -170.0), (55.0, -160.0), (60.0, -150.0),
];

const ALPIDE_BELT: &[(f64, f64)] = &[
    (35.0, -5.0), (37.0, 0.0), (38.0, 5.0), (38.0, 10.0), (38.0, 15.0), (37.0, 20.0),
    (37.0, 25.0), (38.0, 30.0), (38.0, 35.0), (37.0, 40.0), (37.0, 45.0), (35.0, 50.0),
    (33.0, 55.0), (32.0, 60.0), (30.0, 65.0), (28.0, 70.0), (27.0, 75.0), (28.0, 80.0),
    (28.0, 85.0), (28.0, 90.0), (27.0, 95.0), (25.0, 97.0), (20.0, 98.0), (15.0, 99.0),
    (10.0, 100.0), (5.0, 105.0), (0.0, 110.0), (-5.0, 115.0), (-10.0, 120.0),
];

#[inline]
fn project(lon: f64, lat: f64) -> (f64, f64) {
    ((lon + 180.0) / 360.0 * W, (90.0 - lat) / 180.0 * H)
}

pub fn marker_radius(magnitude: f64) -> f64 {
    (magnitude * 1.5).max(3.0)
}

pub fn depth_color(depth_km: f64) -> &'static str {
    if depth_km < 10.0 {
        "#ff0000"
    } else if depth_km < 50.0 {
        "#ff6600"
    } else if depth_km < 100.0 {
        "#ffcc00"
    } else if depth_km < 300.0 {
        "#00cc00"
    } else {
        "#0000ff"
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// GeoJSON basemap → SVG paths
// ---------------------------------------------------------------------------

fn ring_to_path(ring: &[Value]) -> Option<String> {
    let mut d = String::new();
    for pt in ring {
        let (Some(lon), Some(lat)) = (pt[0].as_f64(), pt[1].as_f64()) else { continue };
        let (x, y) = project(lon, lat);
        let cmd = if d.is_empty() { 'M' } else { 'L' };
        let _ = write!(d, "{cmd}{x:.2},{y:.2}");
    }
    if d.is_empty() {
        return None;
    }
    d.push('Z');
    Some(d)
}

/// Outline paths for every `Polygon` / `MultiPolygon` in a FeatureCollection.
pub fn basemap_paths(geojson: &Value) -> Vec<String> {
    let polygons = |geom: &Value| -> Vec<Value> {
        match (geom["type"].as_str(), &geom["coordinates"]) {
            (Some("Polygon"), coords @ Value::Array(_)) => vec![coords.clone()],
            (Some("MultiPolygon"), Value::Array(polys)) => polys.clone(),
            _ => Vec::new(),
        }
    };

    geojson["features"]
        .as_array()
        .into_iter()
        .flatten()
        .flat_map(|feature| polygons(&feature["geometry"]))
        .flat_map(|poly| poly.as_array().cloned().unwrap_or_default())
        .filter_map(|ring| ring.as_array().and_then(|pts| ring_to_path(pts)))
        .collect()
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Accumulates what the session hands it and renders on demand.
#[derive(Debug, Default)]
pub struct SvgMap {
    basemap: Vec<String>,
    total: usize,
    threshold_years: i32,
    visible: Vec<EventRecord>,
}

impl SvgMap {
    pub fn new(basemap: Option<&Value>) -> Self {
        Self {
            basemap: basemap.map(basemap_paths).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn to_svg(&self) -> String {
        let mut s = String::with_capacity(1 << 20);

        let _ = write!(
            s,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{W}" height="{H}" viewBox="0 0 {W} {H}">
  <title>Major Earthquakes</title>
  <desc>{n} of {total} earthquakes from the last {t} years.</desc>
"#,
            n = self.visible.len(),
            total = self.total,
            t = self.threshold_years,
        );
        let _ = writeln!(s, "  <rect width='{W}' height='{H}' fill='{OCEAN}'/>");

        s.push_str("  <g stroke='#162032' stroke-width='0.5'>\n");
        for lon in (-180..=180).step_by(30) {
            let (x, _) = project(f64::from(lon), 0.0);
            let _ = writeln!(s, "    <line x1='{x:.1}' y1='0' x2='{x:.1}' y2='{H}'/>");
        }
        for lat in (-90..=90).step_by(30) {
            let (_, y) = project(0.0, f64::from(lat));
            let _ = writeln!(s, "    <line x1='0' y1='{y:.1}' x2='{W}' y2='{y:.1}'/>");
        }
        s.push_str("  </g>\n");

        if !self.basemap.is_empty() {
            s.push_str("  <g fill='#1d3461' stroke='#2d4a7a' stroke-width='0.5'>\n");
            for d in &self.basemap {
                let _ = writeln!(s, "    <path d='{d}'/>");
            }
            s.push_str("  </g>\n");
        }

        self.render_belts(&mut s);
        self.render_markers(&mut s);
        self.render_legends(&mut s);

        s.push_str("</svg>\n");
        s
    }

    fn render_belts(&self, s: &mut String) {
        s.push_str("  <g fill='none' stroke-width='3' stroke-opacity='0.7'>\n");
        for (vertices, color) in [(RING_OF_FIRE, "red"), (ALPIDE_BELT, "orange")] {
            // Split where a segment jumps across the antimeridian.
            let mut d = String::new();
            let mut prev_lon: Option<f64> = None;
            for &(lat, lon) in vertices {
                let (x, y) = project(lon, lat);
                let jump = prev_lon.is_some_and(|p| (lon - p).abs() > 180.0);
                let cmd = if prev_lon.is_none() || jump { 'M' } else { 'L' };
                let _ = write!(d, "{cmd}{x:.1},{y:.1}");
                prev_lon = Some(lon);
            }
            let _ = writeln!(s, "    <path d='{d}' stroke='{color}'/>");
        }
        s.push_str("  </g>\n");
    }

    fn render_markers(&self, s: &mut String) {
        s.push_str("  <g stroke='#000' stroke-width='1' fill-opacity='0.7'>\n");
        for quake in &self.visible {
            let (x, y) = project(quake.longitude, quake.latitude);
            let _ = writeln!(
                s,
                "    <circle cx='{x:.1}' cy='{y:.1}' r='{r:.1}' fill='{fill}'><title>M{mag:.1} {place}\n{when}\nDepth: {depth:.1} km\n{lat:.2}, {lon:.2}</title></circle>",
                r = marker_radius(quake.magnitude),
                fill = depth_color(quake.depth_km),
                mag = quake.magnitude,
                place = escape(&quake.place),
                when = quake.occurred_at.format("%Y-%m-%d %H:%M:%S UTC"),
                depth = quake.depth_km,
                lat = quake.latitude,
                lon = quake.longitude,
            );
        }
        s.push_str("  </g>\n");
    }

    fn render_legends(&self, s: &mut String) {
        s.push_str("  <g font-family='monospace' font-size='11' fill='#e2e8f0'>\n");

        // belts, bottom right
        let bx = W - 150.0;
        let mut by = H - 50.0;
        let _ = writeln!(s, "    <text x='{bx:.1}' y='{by:.1}' font-size='12'>Earthquake Belts</text>");
        for (color, label) in [("red", "Ring of Fire"), ("orange", "Alpide Belt")] {
            by += 16.0;
            let _ = writeln!(s, "    <rect x='{bx:.1}' y='{:.1}' width='12' height='4' fill='{color}'/>", by - 4.0);
            let _ = writeln!(s, "    <text x='{:.1}' y='{by:.1}'>{label}</text>", bx + 18.0);
        }

        // magnitude and depth, bottom left
        let lx = 16.0_f64;
        let mut ly = H - 250.0;
        let _ = writeln!(s, "    <text x='{lx:.1}' y='{ly:.1}' font-size='12'>Magnitude</text>");
        for mag in [6.0, 7.0, 8.0, 9.0] {
            let r = marker_radius(mag);
            ly += 2.0 * r + 4.0;
            let _ = writeln!(
                s,
                "    <circle cx='{:.1}' cy='{:.1}' r='{r:.1}' fill='#fff' stroke='#000'/>",
                lx + 14.0,
                ly - r
            );
            let _ = writeln!(s, "    <text x='{:.1}' y='{:.1}'>{mag:.1}</text>", lx + 34.0, ly - r + 4.0);
        }
        ly += 18.0;
        let _ = writeln!(s, "    <text x='{lx:.1}' y='{ly:.1}' font-size='12'>Depth</text>");
        let bands = [(5.0, "&lt; 10 km"), (30.0, "10-50 km"), (75.0, "50-100 km"), (200.0, "100-300 km"), (400.0, "&gt; 300 km")];
        for (depth, label) in bands {
            ly += 14.0;
            let _ = writeln!(
                s,
                "    <rect x='{lx:.1}' y='{:.1}' width='10' height='10' fill='{}'/>",
                ly - 9.0,
                depth_color(depth)
            );
            let _ = writeln!(s, "    <text x='{:.1}' y='{ly:.1}'>{label}</text>", lx + 16.0);
        }

        let _ = writeln!(
            s,
            "    <text x='{lx:.1}' y='{:.1}' font-size='10' fill='#94a3b8'>{} years ({} earthquakes)</text>",
            H - 8.0,
            self.threshold_years,
            self.visible.len()
        );
        s.push_str("  </g>\n");
    }
}

impl EventView for SvgMap {
    fn replace_events(&mut self, records: &[EventRecord]) {
        self.total = records.len();
        self.visible.clear();
    }

    fn show_filtered(&mut self, threshold_years: i32, visible: &[&EventRecord]) {
        self.threshold_years = threshold_years;
        self.visible = visible.iter().map(|&r| r.clone()).collect();
    }
}
