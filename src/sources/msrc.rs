use crate::cvss::{self, ScoreCandidate};
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, Fetcher, strip_query};
use crate::types::{BulletinRecord, NormalizedRecord, SourceId};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{SourceAdapter, lenient, str_field};

/// Provenance tag for MSRC records
pub const SOURCE: &str = "Microsoft";

/// Page link field of an OData response
pub const NEXT_LINK_FIELD: &str = "@odata.nextLink";

const MSRC_URL_PREFIX: &str = "https://msrc.microsoft.com/update-guide/vulnerability/";
const UNKNOWN: &str = "Unknown";

/// Reads recently released vulnerabilities from the MSRC update guide
pub struct MsrcAdapter {
    fetcher: Fetcher,
    base_url: String,
    lookback_days: u32,
    api_key: Option<String>,
}

impl MsrcAdapter {
    /// Create an adapter for the endpoint at `base_url`
    ///
    /// `api_key` is sent as the `api-key` header when present.
    pub fn new(
        fetcher: Fetcher,
        base_url: impl Into<String>,
        lookback_days: u32,
        api_key: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            lookback_days,
            api_key,
        }
    }

    fn request_options(&self) -> FetchOptions {
        let options = FetchOptions::json().header("Accept", "application/json");
        match &self.api_key {
            Some(key) => options.header("api-key", key.as_str()),
            None => options,
        }
    }

    /// Follow the page links from the first page, accumulating items
    ///
    /// Stops at the first page without a next link, or at the first failure.
    /// A failure on the first page is returned; later failures keep what was
    /// accumulated so far.
    pub async fn fetch_all(&self, since: &str) -> Result<Vec<Value>> {
        let options = self.request_options();
        let mut items = Vec::new();
        let mut next = Some(first_page_url(&self.base_url, since)?);
        let mut page_num = 1usize;

        while let Some(url) = next.take() {
            info!("Fetching MSRC page {} from {}", page_num, strip_query(&url));

            let page = match self.fetcher.fetch_json(&url, options.clone()).await {
                Ok(page) => page,
                Err(e) if page_num == 1 => return Err(e.into()),
                Err(e) => {
                    warn!(
                        page = page_num,
                        accumulated = items.len(),
                        "Error fetching MSRC data from {}: {}; keeping partial results",
                        strip_query(&url),
                        e
                    );
                    break;
                }
            };

            if let Some(values) = page.get("value").and_then(Value::as_array) {
                items.extend(values.iter().cloned());
            }

            next = str_field(&page, NEXT_LINK_FIELD)
                .filter(|link| !link.is_empty())
                .map(str::to_string);
            page_num += 1;
        }

        info!(pages = page_num - 1, items = items.len(), "No more MSRC pages to fetch");
        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for MsrcAdapter {
    fn id(&self) -> SourceId {
        SourceId::Msrc
    }

    async fn collect(&self) -> Result<Vec<NormalizedRecord>> {
        let since = release_date_floor(Utc::now(), self.lookback_days)?;

        if self.api_key.is_some() {
            info!("Using MSRC API key");
        } else {
            info!("No MSRC API key found, accessing MSRC API without authentication (may be rate-limited)");
        }
        info!("Fetching MSRC vulnerabilities released after {}", since);

        let items = self.fetch_all(&since).await?;
        if items.is_empty() {
            info!("No MSRC vulnerabilities found for the period after {}.", since);
            return Err(Error::EmptyResult(format!(
                "no MSRC vulnerabilities released after {}",
                since
            )));
        }

        Ok(items
            .iter()
            .filter_map(normalize_item)
            .map(NormalizedRecord::Bulletin)
            .collect())
    }
}

/// Lower bound for `releaseDate`, formatted for the OData filter
///
/// # Errors
/// Returns a config error when the window reaches past the representable date range
pub fn release_date_floor(now: DateTime<Utc>, lookback_days: u32) -> Result<String> {
    let floor = TimeDelta::try_days(i64::from(lookback_days))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            Error::config(
                format!("lookback of {} days is out of range", lookback_days),
                "lookback_days",
            )
        })?;
    Ok(floor.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// First page URL: the base endpoint with a `releaseDate gt <since>` filter
pub fn first_page_url(base_url: &str, since: &str) -> Result<String> {
    let mut url = url::Url::parse(base_url).map_err(|e| {
        Error::config(
            format!("invalid MSRC endpoint '{}': {}", base_url, e),
            "sources.msrc_base_url",
        )
    })?;
    url.set_query(Some(&format!("$filter=releaseDate gt {}", since)));
    Ok(url.to_string())
}

/// Map one MSRC vulnerability item
///
/// Fields of the wrong JSON type read as empty. Returns None only when the
/// item is not an object.
pub fn normalize_item(item: &Value) -> Option<BulletinRecord> {
    let vuln = match MsrcVulnerability::deserialize(item) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Skipping malformed MSRC item");
            return None;
        }
    };

    let cve_id = vuln.cve_number.unwrap_or_default();
    let msrc_url = if cve_id.is_empty() {
        String::new()
    } else {
        format!("{}{}", MSRC_URL_PREFIX, cve_id)
    };

    let cvss = cvss::select_best(
        vuln.cvss_score_sets
            .unwrap_or_default()
            .into_iter()
            .map(|s| ScoreCandidate::from_vector(s.base_score, s.severity, s.vector)),
    );

    let affected_products = vuln
        .affected_products
        .unwrap_or_default()
        .into_iter()
        .map(|p| {
            format!(
                "{} - {}",
                p.product_family.as_deref().unwrap_or("Unknown Family"),
                p.product_name.as_deref().unwrap_or("Unknown Product")
            )
        })
        .collect();

    Some(BulletinRecord {
        source: SOURCE.to_string(),
        cve_id,
        title: vuln.vulnerability_name.unwrap_or_default(),
        description: description_text(vuln.description.as_ref()),
        published_date: vuln.release_date.unwrap_or_default(),
        cvss,
        affected_products,
        exploited_status: opaque_flag(vuln.exploited),
        publicly_disclosed: opaque_flag(vuln.publicly_disclosed),
        msrc_url,
    })
}

// Nested `{ "value": ... }` object, or a bare string in older payloads
fn description_text(description: Option<&Value>) -> String {
    let text = match description {
        Some(Value::Object(map)) => map.get("value").and_then(Value::as_str),
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    };
    text.unwrap_or_default().trim().to_string()
}

// Flags are free-form vocabulary ("Yes", "No", "Yes - Publicly Disclosed")
fn opaque_flag(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => UNKNOWN.to_string(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

// MSRC update-guide item, every field optional and read leniently

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MsrcVulnerability {
    #[serde(default, deserialize_with = "lenient::field")]
    cve_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    release_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    vulnerability_name: Option<String>,
    description: Option<Value>,
    #[serde(default, deserialize_with = "lenient::list")]
    cvss_score_sets: Option<Vec<CvssScoreSet>>,
    #[serde(default, deserialize_with = "lenient::list")]
    affected_products: Option<Vec<AffectedProduct>>,
    exploited: Option<Value>,
    publicly_disclosed: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssScoreSet {
    #[serde(default, with = "cvss::lenient_score")]
    base_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::field")]
    severity: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    vector: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AffectedProduct {
    #[serde(default, deserialize_with = "lenient::field")]
    product_family: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    product_name: Option<String>,
}
