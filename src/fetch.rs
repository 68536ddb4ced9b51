//! HTTP transport for all sources
//!
//! A [`Fetcher`] performs exactly one GET per call: no retries, no backoff.
//! Failures come back as [`FetchError`] values tagged with their cause, so the
//! pipeline can skip the affected source and carry on with the next one.

use crate::config::HttpConfig;
use crate::error::{Error, FetchError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info};

/// Per-request options for [`Fetcher::fetch`]
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    /// Extra headers, merged over the default User-Agent (caller wins)
    pub headers: Vec<(String, String)>,
    /// Treat the body as gzip and decompress it before anything else
    pub decompress_gzip: bool,
    /// Override the client's default timeout
    pub timeout: Option<Duration>,
    /// Decode the (decompressed) body as UTF-8 JSON
    pub parse_json: bool,
}

impl FetchOptions {
    /// Options for a JSON document
    pub fn json() -> Self {
        Self {
            parse_json: true,
            ..Default::default()
        }
    }

    /// Options for raw bytes
    pub fn bytes() -> Self {
        Self::default()
    }

    /// Builder-style gzip toggle
    pub fn gzip(mut self) -> Self {
        self.decompress_gzip = true;
        self
    }

    /// Builder-style header addition
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Body returned by a successful fetch
#[derive(Clone, Debug, PartialEq)]
pub enum Fetched {
    /// Raw (possibly decompressed) bytes
    Bytes(Vec<u8>),
    /// Parsed JSON document
    Json(serde_json::Value),
}

/// Single-attempt HTTP GET client shared by all sources
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
}

impl Fetcher {
    /// Create a fetcher from HTTP settings
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout,
        })
    }

    /// Fetch `url` once, applying the decompression and decoding in `options`
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> std::result::Result<Fetched, FetchError> {
        let body = self.fetch_body(url, options).await?;
        if options.parse_json {
            decode_json(url, &body).map(Fetched::Json)
        } else {
            Ok(Fetched::Bytes(body))
        }
    }

    /// Fetch and decode a JSON document
    pub async fn fetch_json(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> std::result::Result<serde_json::Value, FetchError> {
        let body = self.fetch_body(url, &options).await?;
        decode_json(url, &body)
    }

    /// Fetch raw (possibly decompressed) bytes, ignoring `parse_json`
    pub async fn fetch_bytes(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        self.fetch_body(url, &options).await
    }

    // One GET, status check, then gzip when asked
    async fn fetch_body(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        info!(url = %strip_query(url), "Fetching");

        let headers = self.merged_headers(url, &options.headers)?;
        let response = self
            .client
            .get(url)
            .headers(headers)
            .timeout(options.timeout.unwrap_or(self.timeout))
            .send()
            .await
            .map_err(|e| network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = response.bytes().await.map_err(|e| network(url, e))?;
        debug!(url = %strip_query(url), bytes = body.len(), "Response received");

        if options.decompress_gzip {
            gunzip(&body).map_err(|e| FetchError::Decompress {
                url: url.to_string(),
                reason: e.to_string(),
            })
        } else {
            Ok(body.to_vec())
        }
    }

    fn merged_headers(
        &self,
        url: &str,
        extra: &[(String, String)],
    ) -> std::result::Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&self.user_agent).map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: format!("invalid User-Agent header: {}", e),
        })?;
        headers.insert(USER_AGENT, user_agent);

        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: format!("invalid header name '{}': {}", name, e),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: format!("invalid value for header '{}': {}", name, e),
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

fn decode_json(url: &str, body: &[u8]) -> std::result::Result<serde_json::Value, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn network(url: &str, e: reqwest::Error) -> FetchError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    FetchError::Network {
        url: url.to_string(),
        reason,
    }
}

/// URL without its query string, for log lines
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// Decompress a gzip stream, including every member of a multi-member stream
pub fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = flate2::read::MultiGzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
