//! Error types for the three pipeline stages.
//!
//! Only `ConfigError` is fatal to a run. Resolution and fetch errors are
//! scoped to a single archive and reported alongside the other results.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce usable `Settings`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no bearer token: set NUSCENES_TOKEN, add bearer_token to the config file, or enter it when prompted")]
    MissingCredential,
    #[error("failed to read token from terminal")]
    Prompt(#[source] io::Error),
}

/// Low-level transfer failure (libcurl error or broken sink).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Curl(#[from] curl::Error),
    #[error("write failed: {0}")]
    Sink(#[source] io::Error),
}

impl TransportError {
    /// True when the transfer was aborted by its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Curl(e) if e.is_operation_timedout())
    }
}

/// Failure to obtain a signed URL for one archive.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("authentication failed (HTTP {status}); the token may have expired")]
    Unauthorized { status: u32 },
    #[error("request failed with HTTP {status}")]
    Http { status: u32 },
    #[error("response did not contain a download url")]
    MissingUrl,
    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("network error: {0}")]
    Transport(#[from] TransportError),
}

/// Failure while downloading or checking one archive.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} was not resolved")]
    NotResolved(String),
    #[error("download failed with HTTP {status}")]
    Http { status: u32 },
    #[error("network error: {0}")]
    Transport(#[source] TransportError),
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }
}
