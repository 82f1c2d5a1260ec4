//! Error types for comic-fetch
//!
//! A single [`Error`] enum covers the whole crate. Every variant carries enough
//! context (URL, path, status) to be logged on its own, and the retry layer
//! classifies variants through [`IsRetryable`](crate::retry::IsRetryable).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for comic-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for comic-fetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency_limit")
        key: Option<String>,
    },

    /// A batch was rejected before any I/O (duplicate or non-dense ordinals)
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// The URL could not be parsed or is not an absolute http(s) URL
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending input
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Destination directory could not be created or is not a directory
    #[error("destination {path} unavailable: {source}")]
    Destination {
        /// The directory that could not be prepared
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Remote server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// Requested URL
        url: String,
    },

    /// One attempt exceeded the configured request timeout
    #[error("request to {url} timed out after {seconds}s")]
    Timeout {
        /// Requested URL
        url: String,
        /// Timeout that elapsed, in seconds
        seconds: u64,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A file or directory operation failed
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// File being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error without a more specific context
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// XML serialization error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// The page accessor failed to read a comic or episode page
    #[error("page lookup failed for {url}: {message}")]
    Page {
        /// Page URL
        url: String,
        /// Reason reported by the accessor
        message: String,
    },

    /// Work was abandoned because cancellation was requested
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Wrap an I/O error raised while working on `path`
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Machine-readable code used in structured log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidBatch(_) => "invalid_batch",
            Error::InvalidUrl { .. } => "invalid_url",
            Error::Destination { .. } => "destination_unavailable",
            Error::HttpStatus { .. } => "http_status",
            Error::Timeout { .. } => "timeout",
            Error::Network(_) => "network_error",
            Error::Filesystem { .. } => "filesystem_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Xml(_) => "xml_error",
            Error::Page { .. } => "page_error",
            Error::Cancelled => "cancelled",
        }
    }
}
