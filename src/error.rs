//! Error type shared by the whole load pipeline.
//!
//! Fetch and parse failures bubble up to the fallback controller, which is
//! the only place that decides whether to switch sources.

use crate::record::MalformedReason;

#[derive(Debug, thiserror::Error)]
pub enum QuakeError {
    /// The catalog answered with a non-success HTTP status.
    #[error("catalog returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// A response body could not be decoded into the expected shape.
    #[error("payload error: {0}")]
    Payload(String),

    /// Strict normalization hit a record it could not accept.
    #[error("malformed record #{index}: {reason}")]
    MalformedRecord {
        index: usize,
        reason: MalformedReason,
    },

    /// Reading the static fallback resource failed.
    #[error("fallback source {path}: {source}")]
    Fallback {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Both the remote catalog and the fallback source failed.
    #[error("remote catalog unavailable ({remote}); fallback failed: {fallback}")]
    AllSourcesFailed {
        remote: String,
        fallback: Box<QuakeError>,
    },

    /// Rendering was requested before any load cycle succeeded.
    #[error("no active collection")]
    NoCollection,

    #[error("config error: {0}")]
    Config(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ureq::Error> for QuakeError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, resp) => Self::Status {
                status,
                url: resp.get_url().to_owned(),
            },
            ureq::Error::Transport(t) => Self::Transport(t.to_string()),
        }
    }
}

pub type Result<T, E = QuakeError> = std::result::Result<T, E>;
