use std::num::{ParseFloatError, ParseIntError};
use std::time::Duration;

use thiserror::Error;

use crate::model::Field;

/// Failure reaching the target page. Always fatal for the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid target url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("host '{host}' is not in the allowed domains")]
    DisallowedHost { host: String },
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("GET {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },
    #[error("GET {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch cancelled")]
    Cancelled,
}

/// A row whose field could not be turned into a typed value.
#[derive(Debug, Error)]
#[error("row {row}: field '{field}' from {raw:?}: {cause}")]
pub struct ExtractError {
    pub row: usize,
    pub field: Field,
    pub raw: String,
    #[source]
    pub cause: ExtractCause,
}

#[derive(Debug, Error)]
pub enum ExtractCause {
    #[error("empty text where a number was expected")]
    Empty,
    #[error("unexpected characters in numeric text")]
    InvalidCharacters,
    #[error("not an integer: {0}")]
    InvalidInteger(#[from] ParseIntError),
    #[error("not a decimal: {0}")]
    InvalidDecimal(#[from] ParseFloatError),
    #[error("decimal out of single-precision range")]
    OutOfRange,
    #[error("row has no cell at position {position}")]
    MissingCell { position: usize },
}

/// A write to one sink failed. Other sinks are unaffected.
#[derive(Debug, Error)]
#[error("sink '{sink}': {cause}")]
pub struct SinkError {
    pub sink: String,
    #[source]
    pub cause: SinkCause,
}

#[derive(Debug, Error)]
pub enum SinkCause {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    #[error("write cancelled")]
    Cancelled,
}

/// Invalid or unusable settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid selector for '{name}' ({selector}): {reason}")]
    Selector {
        name: &'static str,
        selector: String,
        reason: String,
    },
    #[error("invalid column map: {0}")]
    Columns(String),
}

/// Reasons a pipeline run stops early.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("aborting on row error: {0}")]
    Extract(#[from] ExtractError),
    #[error("aborting on sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("cannot open store: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("run cancelled")]
    Cancelled,
}
