//! Remote catalog access: one page at a time over a transport, every page
//! of a region, then both regions.
//!
//! The catalog is an FDSN event service (USGS by default). Pages are
//! requested with `limit`/`offset`; a full page means there may be more.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{QuakeError, Result};
use crate::region::BoundingRegion;

pub const USGS_QUERY_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

/// The catalog's hard per-request ceiling.
pub const DEFAULT_PAGE_SIZE: usize = 20_000;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Time bounds and magnitude floor shared by every page of a load cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_magnitude: f64,
}

/// Everything needed to ask the catalog for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub region: BoundingRegion,
    pub window: QueryWindow,
    pub limit: usize,
    /// 1-based, as the FDSN interface expects.
    pub offset: usize,
}

impl PageRequest {
    /// Query-string pairs in the order they are sent.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("format", "geojson".to_owned()),
            ("minmagnitude", self.window.min_magnitude.to_string()),
            ("starttime", self.window.start.format(TIME_FORMAT).to_string()),
            ("endtime", self.window.end.format(TIME_FORMAT).to_string()),
            ("minlatitude", self.region.min_latitude.to_string()),
            ("maxlatitude", self.region.max_latitude.to_string()),
            ("minlongitude", self.region.min_longitude.to_string()),
            ("maxlongitude", self.region.max_longitude.to_string()),
            ("orderby", "time".to_owned()),
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ]
    }
}

/// Fetches one page of GeoJSON features.
pub trait CatalogTransport {
    fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Value>>;
}

/// Blocking HTTP transport.
pub struct UreqTransport {
    agent: ureq::Agent,
    endpoint: String,
}

impl UreqTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: endpoint.into(),
        }
    }
}

impl CatalogTransport for UreqTransport {
    fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Value>> {
        let mut call = self
            .agent
            .get(&self.endpoint)
            .set("Accept-Encoding", "identity");
        for (key, value) in request.query_pairs() {
            call = call.query(key, &value);
        }
        let resp = call.call()?;
        let body: Value = serde_json::from_reader(resp.into_reader())?;
        features_of(body)
    }
}

/// Pull the `features` array out of a FeatureCollection body.
pub fn features_of(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Object(mut map) => match map.remove("features") {
            Some(Value::Array(features)) => Ok(features),
            _ => Err(QuakeError::Payload("response has no `features` array".into())),
        },
        _ => Err(QuakeError::Payload("response is not a JSON object".into())),
    }
}

/// Progress notification emitted after each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub region: &'static str,
    pub page: usize,
    /// Features fetched for this region so far.
    pub fetched: usize,
}

/// Paginating client over some transport.
pub struct Catalog<T> {
    transport: T,
    page_size: usize,
    regions: Vec<BoundingRegion>,
}

impl<T: CatalogTransport> Catalog<T> {
    pub fn new(transport: T, page_size: usize, regions: Vec<BoundingRegion>) -> Self {
        Self {
            transport,
            page_size: page_size.max(1),
            regions,
        }
    }

    pub fn regions(&self) -> &[BoundingRegion] {
        &self.regions
    }

    /// Fetch every page for one region. Stops at the first short page; any
    /// page error aborts the region and drops what was already fetched.
    pub fn fetch_region(
        &self,
        region: &BoundingRegion,
        window: &QueryWindow,
        on_progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<Vec<Value>> {
        let mut features = Vec::new();
        let mut request = PageRequest {
            region: *region,
            window: *window,
            limit: self.page_size,
            offset: 1,
        };
        let mut page = 0;

        loop {
            page += 1;
            debug!(region = region.label, page, offset = request.offset, "requesting page");
            let batch = self.transport.fetch_page(&request)?;
            let full = batch.len() >= self.page_size;
            features.extend(batch);

            let progress = FetchProgress {
                region: region.label,
                page,
                fetched: features.len(),
            };
            info!(region = region.label, page, fetched = progress.fetched, "page fetched");
            on_progress(progress);

            if !full {
                break;
            }
            request.offset += self.page_size;
        }

        Ok(features)
    }

    /// Fetch each configured region in turn and concatenate the results.
    /// One failing region fails the whole fetch.
    pub fn fetch_all(
        &self,
        window: &QueryWindow,
        on_progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        for region in &self.regions {
            let features = self.fetch_region(region, window, on_progress)?;
            info!(region = region.label, count = features.len(), "region complete");
            all.extend(features);
        }
        Ok(all)
    }
}
