use std::path::PathBuf;
use std::time::Duration;

/// Everything that can go wrong while producing feeds.
///
/// Only configuration and persistence errors are fatal to a run. Fetch errors
/// are caught per ship by the pipeline and downgraded to "no events".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("browser failed: {0}")]
    Browser(String),

    #[error("fetch of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("failed to write feed: {0}")]
    Feed(String),

    #[error("invalid ship list: {0}")]
    Ships(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}
