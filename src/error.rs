//! Error types for intel-ingest
//!
//! This module provides the error taxonomy for the ingestion pipeline:
//! - Transport failures ([`FetchError`]) split by cause (network, decompression, parsing)
//! - Decode failures for source payloads (bad ZIP, missing JSON member, bad STIX JSON)
//! - Empty results and malformed feeds, which skip a source without failing the run
//! - Machine-readable error codes used in pipeline events

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for intel-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for intel-ingest
///
/// Every variant carries enough context to produce a single log line naming the
/// failing source and the cause. None of these are fatal to a run except when
/// raised during startup (configuration, output directory, HTTP client).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// Transport-level failure from the fetcher
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A payload was retrieved but could not be decoded (bad ZIP, no JSON member, bad JSON)
    #[error("failed to decode {context}: {reason}")]
    Decode {
        /// What was being decoded (e.g., "ATT&CK enterprise bundle")
        context: String,
        /// Why decoding failed
        reason: String,
    },

    /// Payload of a shape the adapter cannot handle at all
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),

    /// Well-formed source data that produced zero usable records
    #[error("no records: {0}")]
    EmptyResult(String),

    /// Feed parser flagged the feed as malformed and produced no entries
    #[error("malformed feed {url}: {reason}")]
    MalformedFeed {
        /// Feed URL
        url: String,
        /// Parser-reported cause
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Transport failure returned by [`crate::fetch::Fetcher`]
///
/// The fetcher never panics or aborts the process; callers receive one of these
/// and skip the affected source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Unreachable host, timeout, or non-2xx status
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// Requested URL
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// Body was not valid gzip
    #[error("failed to decompress gzip body from {url}: {reason}")]
    Decompress {
        /// Requested URL
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// Body was not valid UTF-8 JSON
    #[error("failed to decode JSON from {url}: {reason}")]
    Parse {
        /// Requested URL
        url: String,
        /// Underlying cause
        reason: String,
    },
}

/// Cause tag for a [`FetchError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchCause {
    /// Network or HTTP status failure
    Network,
    /// Gzip decompression failure
    Decompress,
    /// JSON parse failure
    Parse,
}

impl FetchError {
    /// Get the cause tag for this failure
    pub fn cause(&self) -> FetchCause {
        match self {
            FetchError::Network { .. } => FetchCause::Network,
            FetchError::Decompress { .. } => FetchCause::Decompress,
            FetchError::Parse { .. } => FetchCause::Parse,
        }
    }

    /// URL of the failed request
    pub fn url(&self) -> &str {
        match self {
            FetchError::Network { url, .. }
            | FetchError::Decompress { url, .. }
            | FetchError::Parse { url, .. } => url,
        }
    }
}

/// Coarse failure class used when reporting a skipped source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unreachable host, timeout, non-2xx status
    NetworkFailure,
    /// Bad gzip, bad ZIP, bad JSON, unexpected payload shape
    DecodeFailure,
    /// Well-formed but zero usable records
    EmptyResult,
    /// Feed parser signalled corruption with no usable entries
    MalformedFeed,
    /// Local filesystem failure while writing output
    Io,
    /// Invalid configuration
    Config,
}

impl Error {
    /// Classify this error into the pipeline's failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } => ErrorKind::Config,
            Error::Fetch(e) => match e.cause() {
                FetchCause::Network => ErrorKind::NetworkFailure,
                FetchCause::Decompress | FetchCause::Parse => ErrorKind::DecodeFailure,
            },
            Error::Decode { .. } | Error::UnexpectedPayload(_) | Error::Serialization(_) => {
                ErrorKind::DecodeFailure
            }
            Error::EmptyResult(_) => ErrorKind::EmptyResult,
            Error::MalformedFeed { .. } => ErrorKind::MalformedFeed,
            Error::Io(_) | Error::Other(_) => ErrorKind::Io,
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Fetch(e) => match e {
                FetchError::Network { .. } => "network_error",
                FetchError::Decompress { .. } => "decompress_error",
                FetchError::Parse { .. } => "json_parse_error",
            },
            Error::Decode { .. } => "decode_error",
            Error::UnexpectedPayload(_) => "unexpected_payload",
            Error::EmptyResult(_) => "empty_result",
            Error::MalformedFeed { .. } => "malformed_feed",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Shorthand for a configuration error on a named key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Shorthand for a decode failure
    pub fn decode(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Decode {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}
