//! Canonical earthquake record and the two normalizers feeding it.
//!
//! The catalog speaks GeoJSON (`[lng, lat, depth]` coordinates, epoch
//! millisecond times); the static fallback is a CSV export with one column
//! per field. Both end up as [`EventRecord`].

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{QuakeError, Result};

pub const UNKNOWN_PLACE: &str = "Unknown location";

/// One earthquake, ready for filtering and drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
    pub depth_km: f64,
    pub place: String,
    pub occurred_at: DateTime<Utc>,
    /// Calendar-year difference against the clock used at normalization.
    pub age_years: i32,
    pub source_id: Option<String>,
    pub detail_url: Option<String>,
}

/// Why an input row or feature was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    MissingField(&'static str),
    InvalidNumber { field: &'static str, value: String },
    InvalidTime(String),
    MissingCoordinates,
    Unreadable(String),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::InvalidNumber { field, value } => {
                write!(f, "field `{field}` is not a finite number: {value:?}")
            }
            Self::InvalidTime(value) => write!(f, "unparseable time {value:?}"),
            Self::MissingCoordinates => f.write_str("geometry lacks [lng, lat] coordinates"),
            Self::Unreadable(msg) => write!(f, "unreadable row: {msg}"),
        }
    }
}

/// What to do with inputs that fail their required-field check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NormalizePolicy {
    /// Drop and keep going; drops are listed in [`Normalized::dropped`].
    #[default]
    Lenient,
    /// Fail the whole batch on the first bad input.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord {
    /// Zero-based position in the input (data rows for CSV, features for GeoJSON).
    pub index: usize,
    pub reason: MalformedReason,
}

/// Output of a normalization pass.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<EventRecord>,
    pub dropped: Vec<DroppedRecord>,
}

impl Normalized {
    fn accept(
        &mut self,
        index: usize,
        outcome: Result<EventRecord, MalformedReason>,
        policy: NormalizePolicy,
    ) -> Result<()> {
        match outcome {
            Ok(record) => self.records.push(record),
            Err(reason) => match policy {
                NormalizePolicy::Strict => {
                    return Err(QuakeError::MalformedRecord { index, reason });
                }
                NormalizePolicy::Lenient => {
                    debug!(index, %reason, "dropping malformed record");
                    self.dropped.push(DroppedRecord { index, reason });
                }
            },
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tabular (CSV) input
// ---------------------------------------------------------------------------

/// A CSV row as exported by the catalog's CSV endpoint. Unknown columns
/// are ignored; every recognized one may be absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TabularRow {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub mag: Option<String>,
    pub depth: Option<String>,
    pub place: Option<String>,
    pub time: Option<String>,
    pub id: Option<String>,
}

/// Normalize a whole CSV document (header row required).
///
/// Input is raw bytes: a row with invalid UTF-8 is dropped on its own
/// instead of failing the whole document.
pub fn normalize_tabular(
    data: impl AsRef<[u8]>,
    policy: NormalizePolicy,
    now: DateTime<Utc>,
) -> Result<Normalized> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_ref());

    let mut out = Normalized::default();
    for (index, row) in reader.deserialize::<TabularRow>().enumerate() {
        let outcome = row
            .map_err(|e| MalformedReason::Unreadable(e.to_string()))
            .and_then(|row| normalize_row(&row, now));
        out.accept(index, outcome, policy)?;
    }
    Ok(out)
}

/// Normalize one CSV row.
pub fn normalize_row(row: &TabularRow, now: DateTime<Utc>) -> Result<EventRecord, MalformedReason> {
    let latitude = parse_number("latitude", required("latitude", &row.latitude)?)?;
    let longitude = parse_number("longitude", required("longitude", &row.longitude)?)?;
    let magnitude = parse_number("mag", required("mag", &row.mag)?)?;
    let time = required("time", &row.time)?;
    let occurred_at = parse_time(time).ok_or_else(|| MalformedReason::InvalidTime(time.to_owned()))?;

    let depth_km = present(&row.depth).map_or(0.0, |raw| depth_or_zero(raw.parse().ok(), &raw));

    Ok(EventRecord {
        latitude,
        longitude,
        magnitude,
        depth_km,
        place: present(&row.place).unwrap_or(UNKNOWN_PLACE).to_owned(),
        occurred_at,
        age_years: age_in_years(occurred_at, now),
        source_id: present(&row.id).map(str::to_owned),
        detail_url: None,
    })
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required<'a>(name: &'static str, field: &'a Option<String>) -> Result<&'a str, MalformedReason> {
    present(field).ok_or(MalformedReason::MissingField(name))
}

/// Depth is optional; anything that is not a finite number reads as 0 km.
fn depth_or_zero(depth: Option<f64>, raw: &dyn fmt::Display) -> f64 {
    match depth.filter(|d| d.is_finite()) {
        Some(depth) => depth,
        None => {
            debug!(%raw, "unusable depth, using 0 km");
            0.0
        }
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, MalformedReason> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MalformedReason::InvalidNumber {
            field,
            value: raw.to_owned(),
        })
}

/// Column order of snapshots written by [`write_tabular`].
pub const TABULAR_HEADER: [&str; 7] = ["time", "latitude", "longitude", "depth", "mag", "place", "id"];

/// Write records in the fallback CSV layout.
pub fn write_tabular<W: std::io::Write>(records: &[EventRecord], out: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(TABULAR_HEADER)?;
    for r in records {
        w.write_record([
            r.occurred_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            r.latitude.to_string(),
            r.longitude.to_string(),
            r.depth_km.to_string(),
            r.magnitude.to_string(),
            r.place.clone(),
            r.source_id.clone().unwrap_or_default(),
        ])?;
    }
    w.flush().map_err(csv::Error::from)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Feature (GeoJSON) input
// ---------------------------------------------------------------------------

/// Normalize the `features` array of one or more catalog pages.
pub fn normalize_features(
    features: &[Value],
    policy: NormalizePolicy,
    now: DateTime<Utc>,
) -> Result<Normalized> {
    let mut out = Normalized::default();
    for (index, feature) in features.iter().enumerate() {
        out.accept(index, normalize_feature(feature, now), policy)?;
    }
    Ok(out)
}

/// Normalize one GeoJSON feature. Coordinates arrive as `[lng, lat, depth?]`.
pub fn normalize_feature(feature: &Value, now: DateTime<Utc>) -> Result<EventRecord, MalformedReason> {
    let coords = feature["geometry"]["coordinates"]
        .as_array()
        .filter(|c| c.len() >= 2)
        .ok_or(MalformedReason::MissingCoordinates)?;
    let longitude = json_number("longitude", &coords[0])?;
    let latitude = json_number("latitude", &coords[1])?;
    let depth_km = match coords.get(2) {
        Some(Value::Null) | None => 0.0,
        Some(depth) => depth_or_zero(depth.as_f64(), depth),
    };

    let props = &feature["properties"];
    let magnitude = match &props["mag"] {
        Value::Null => return Err(MalformedReason::MissingField("mag")),
        mag => json_number("mag", mag)?,
    };
    let occurred_at = match &props["time"] {
        Value::Null => return Err(MalformedReason::MissingField("time")),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|ms| ms as i64))
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| MalformedReason::InvalidTime(n.to_string()))?,
        Value::String(s) => parse_time(s).ok_or_else(|| MalformedReason::InvalidTime(s.clone()))?,
        other => return Err(MalformedReason::InvalidTime(other.to_string())),
    };

    let place = props["place"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_PLACE);

    Ok(EventRecord {
        latitude,
        longitude,
        magnitude,
        depth_km,
        place: place.to_owned(),
        occurred_at,
        age_years: age_in_years(occurred_at, now),
        source_id: feature["id"].as_str().map(str::to_owned),
        detail_url: props["url"].as_str().map(str::to_owned),
    })
}

fn json_number(field: &'static str, value: &Value) -> Result<f64, MalformedReason> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MalformedReason::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Parse the time formats seen in catalog exports: RFC 3339, naive
/// timestamps (taken as UTC), bare dates, or epoch milliseconds.
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}

/// Calendar-year subtraction, not elapsed time: an event on Dec 31 is one
/// year old on Jan 1.
pub fn age_in_years(occurred_at: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    now.year() - occurred_at.year()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    const CSV: &str = "\
time,latitude,longitude,depth,mag,place,id
2011-03-11T05:46:24.120Z,38.297,142.373,29,9.1,near the east coast of Honshu,usp000hvnu
2004-12-26T00:58:53.450Z,3.295,95.982,,9.1,,
1960-05-22T19:11:20.000Z,-38.143,-73.407,25,,Bio-Bio Chile,
";

    #[test]
    fn tabular_fields_parse_exactly() {
        let out = normalize_tabular(CSV, NormalizePolicy::Lenient, now()).unwrap();
        let tohoku = &out.records[0];
        assert_eq!(tohoku.latitude, 38.297);
        assert_eq!(tohoku.longitude, 142.373);
        assert_eq!(tohoku.magnitude, 9.1);
        assert_eq!(tohoku.depth_km, 29.0);
        assert_eq!(tohoku.place, "near the east coast of Honshu");
        assert_eq!(tohoku.occurred_at, Utc.with_ymd_and_hms(2011, 3, 11, 5, 46, 24).unwrap() + chrono::Duration::milliseconds(120));
        assert_eq!(tohoku.age_years, 15);
        assert_eq!(tohoku.source_id.as_deref(), Some("usp000hvnu"));
        assert_eq!(tohoku.detail_url, None);
    }

    #[test]
    fn tabular_depth_and_place_default() {
        let out = normalize_tabular(CSV, NormalizePolicy::Lenient, now()).unwrap();
        let sumatra = &out.records[1];
        assert_eq!(sumatra.depth_km, 0.0);
        assert_eq!(sumatra.place, UNKNOWN_PLACE);
        assert_eq!(sumatra.source_id, None);
    }

    #[test]
    fn row_missing_mag_is_dropped_and_counted() {
        let out = normalize_tabular(CSV, NormalizePolicy::Lenient, now()).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(
            out.dropped,
            vec![DroppedRecord {
                index: 2,
                reason: MalformedReason::MissingField("mag"),
            }]
        );
    }

    #[test]
    fn strict_policy_rejects_the_batch() {
        let err = normalize_tabular(CSV, NormalizePolicy::Strict, now()).unwrap_err();
        assert!(matches!(
            err,
            QuakeError::MalformedRecord { index: 2, reason: MalformedReason::MissingField("mag") }
        ));
    }

    #[test]
    fn unparseable_values_are_malformed() {
        let csv = "latitude,longitude,mag,time,depth\n\
                   abc,1,6,2000-01-01,\n\
                   1,1,6,yesterday,\n\
                   1,1,6,2000-01-01,deep\n\
                   1,1,6,2000-01-01,10\n";
        let out = normalize_tabular(csv, NormalizePolicy::Lenient, now()).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.dropped.len(), 2);
        let reasons: Vec<_> = out.dropped.iter().map(|d| d.reason.clone()).collect();
        assert!(matches!(reasons[0], MalformedReason::InvalidNumber { field: "latitude", .. }));
        assert_eq!(reasons[1], MalformedReason::InvalidTime("yesterday".into()));
        assert_eq!(out.records[0].depth_km, 0.0);
        assert_eq!(out.records[1].depth_km, 10.0);
    }

    #[test]
    fn unusable_depth_keeps_the_row() {
        let csv = "time,latitude,longitude,depth,mag\n2011-03-11T05:46:24Z,38.3,142.4,n/a,9.1\n";
        let out = normalize_tabular(csv, NormalizePolicy::Strict, now()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].depth_km, 0.0);
        assert_eq!(out.records[0].magnitude, 9.1);

        let feature = json!({
            "geometry": { "coordinates": [142.4, 38.3, "n/a"] },
            "properties": { "mag": 9.1, "time": 0 }
        });
        let rec = normalize_feature(&feature, now()).unwrap();
        assert_eq!(rec.depth_km, 0.0);
        assert_eq!(rec.latitude, 38.3);
    }

    #[test]
    fn invalid_utf8_row_is_dropped_alone() {
        let mut csv = b"time,latitude,longitude,mag,place\n2011-03-11T05:46:24Z,38.3,142.4,9.1,Honshu\n".to_vec();
        csv.extend_from_slice(b"1960-05-22T19:11:20Z,-38.1,-73.4,9.5,Bio-B\xedo\n");
        csv.extend_from_slice(b"2004-12-26T00:58:53Z,3.3,96.0,9.1,Sumatra\n");

        let out = normalize_tabular(&csv, NormalizePolicy::Lenient, now()).unwrap();

        let places: Vec<_> = out.records.iter().map(|r| r.place.as_str()).collect();
        assert_eq!(places, ["Honshu", "Sumatra"]);
        assert_eq!(out.dropped.len(), 1);
        assert_eq!(out.dropped[0].index, 1);
        assert!(matches!(out.dropped[0].reason, MalformedReason::Unreadable(_)));
    }

    #[test]
    fn feature_coordinates_are_swapped() {
        let feature = json!({
            "type": "Feature",
            "id": "us7000abcd",
            "geometry": { "type": "Point", "coordinates": [139.7, 35.7, 30] },
            "properties": {
                "mag": 7.1,
                "time": 1_700_000_000_000_i64,
                "place": "Tokyo",
                "url": "https://example.test/us7000abcd"
            }
        });
        let rec = normalize_feature(&feature, now()).unwrap();
        assert_eq!(rec.latitude, 35.7);
        assert_eq!(rec.longitude, 139.7);
        assert_eq!(rec.depth_km, 30.0);
        assert_eq!(rec.magnitude, 7.1);
        assert_eq!(rec.occurred_at, DateTime::from_timestamp_millis(1_700_000_000_000).unwrap());
        assert_eq!(rec.age_years, 3);
        assert_eq!(rec.source_id.as_deref(), Some("us7000abcd"));
        assert_eq!(rec.detail_url.as_deref(), Some("https://example.test/us7000abcd"));
    }

    #[test]
    fn feature_without_depth_or_place_uses_defaults() {
        let feature = json!({
            "geometry": { "coordinates": [-70.0, -20.0] },
            "properties": { "mag": 6.4, "time": 0 }
        });
        let rec = normalize_feature(&feature, now()).unwrap();
        assert_eq!(rec.depth_km, 0.0);
        assert_eq!(rec.place, UNKNOWN_PLACE);
        assert_eq!(rec.age_years, 2026 - 1970);
        assert_eq!(rec.source_id, None);
    }

    #[test]
    fn incomplete_features_are_dropped() {
        let features = vec![
            json!({ "geometry": { "coordinates": [10.0] }, "properties": { "mag": 6.0, "time": 0 } }),
            json!({ "geometry": null, "properties": { "mag": 6.0, "time": 0 } }),
            json!({ "geometry": { "coordinates": [10.0, 5.0] }, "properties": { "mag": null, "time": 0 } }),
            json!({ "geometry": { "coordinates": [10.0, 5.0] }, "properties": { "mag": 6.0 } }),
            json!({ "geometry": { "coordinates": [10.0, 5.0] }, "properties": { "mag": 6.0, "time": 0 } }),
        ];
        let out = normalize_features(&features, NormalizePolicy::Lenient, now()).unwrap();
        assert_eq!(out.records.len(), 1);
        let reasons: Vec<_> = out.dropped.into_iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                MalformedReason::MissingCoordinates,
                MalformedReason::MissingCoordinates,
                MalformedReason::MissingField("mag"),
                MalformedReason::MissingField("time"),
            ]
        );
    }

    #[test]
    fn time_formats() {
        let expected = Utc.with_ymd_and_hms(1906, 4, 18, 13, 12, 0).unwrap();
        assert_eq!(parse_time("1906-04-18T13:12:00Z"), Some(expected));
        assert_eq!(parse_time("1906-04-18T13:12:00"), Some(expected));
        assert_eq!(parse_time("1906-04-18 13:12:00.000"), Some(expected));
        assert_eq!(parse_time("1906-04-18"), Utc.with_ymd_and_hms(1906, 4, 18, 0, 0, 0).single());
        assert_eq!(parse_time("0"), DateTime::from_timestamp_millis(0));
        assert_eq!(parse_time("not a date"), None);
    }

    #[test]
    fn snapshot_reads_back_as_fallback_input() {
        let features = vec![json!({
            "id": "us1",
            "geometry": { "coordinates": [142.373, 38.297, 29.0] },
            "properties": { "mag": 9.1, "time": 1_299_822_384_120_i64, "place": "Honshu, Japan" }
        })];
        let remote = normalize_features(&features, NormalizePolicy::Strict, now()).unwrap();

        let mut buf = Vec::new();
        write_tabular(&remote.records, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("time,latitude,longitude,depth,mag,place,id\n2011-03-11T05:46:24.120Z,"));

        let back = normalize_tabular(&text, NormalizePolicy::Strict, now()).unwrap();
        assert_eq!(back.records, remote.records);
    }

    #[test]
    fn age_is_calendar_year_difference() {
        let dec31 = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 0).unwrap();
        let jan1 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap();
        assert_eq!(age_in_years(dec31, jan1), 1);
        assert_eq!(age_in_years(jan1, jan1), 0);
    }
}
