use crate::cvss::{self, ScoreCandidate, VERSION_V2, VERSION_V3};
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, Fetcher};
use crate::types::{NormalizedRecord, SourceId, VulnerabilityRecord};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{SourceAdapter, lenient};

/// Provenance tag for NVD records
pub const SOURCE: &str = "NVD";

/// Reads the gzip-compressed NVD JSON 1.1 feed
pub struct NvdAdapter {
    fetcher: Fetcher,
    url: String,
}

impl NvdAdapter {
    /// Create an adapter for the feed at `url`
    pub fn new(fetcher: Fetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for NvdAdapter {
    fn id(&self) -> SourceId {
        SourceId::Nvd
    }

    async fn collect(&self) -> Result<Vec<NormalizedRecord>> {
        let document = self
            .fetcher
            .fetch_json(&self.url, FetchOptions::json().gzip())
            .await?;

        info!("Parsing NVD JSON feed");
        let records = normalize_feed(&document);
        if records.is_empty() {
            warn!("No NVD data received for parsing.");
            return Err(Error::EmptyResult("NVD feed contained no CVE items".into()));
        }

        Ok(records)
    }
}

/// Map every item of an NVD feed document, in order
///
/// A missing or empty `CVE_Items` list yields no records.
pub fn normalize_feed(document: &Value) -> Vec<NormalizedRecord> {
    document
        .get("CVE_Items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(normalize_item)
                .map(NormalizedRecord::Vulnerability)
                .collect()
        })
        .unwrap_or_default()
}

/// Map a single `CVE_Items` entry
///
/// Fields of the wrong JSON type read as empty. Returns None only when the
/// item is not an object.
pub fn normalize_item(item: &Value) -> Option<VulnerabilityRecord> {
    let item = match NvdItem::deserialize(item) {
        Ok(item) => item,
        Err(e) => {
            warn!(error = %e, "Skipping malformed NVD item");
            return None;
        }
    };

    let cve = item.cve.unwrap_or_default();
    let cve_id = cve.meta.and_then(|m| m.id).unwrap_or_default();

    let description = cve
        .description
        .and_then(|d| d.description_data)
        .unwrap_or_default()
        .into_iter()
        .find(|d| d.lang.as_deref() == Some("en"))
        .and_then(|d| d.value)
        .unwrap_or_default();

    let references = cve
        .references
        .and_then(|r| r.reference_data)
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.url)
        .collect();

    let impact = item.impact.unwrap_or_default();
    let cvss = cvss::select_best(score_candidates(impact));

    Some(VulnerabilityRecord {
        source: SOURCE.to_string(),
        cve_id,
        cvss,
        published_date: item.published_date.unwrap_or_default(),
        last_modified_date: item.last_modified_date.unwrap_or_default(),
        description,
        references,
    })
}

// v3 first, so it wins whenever it carries a base score
fn score_candidates(impact: Impact) -> Vec<ScoreCandidate> {
    let mut candidates = Vec::with_capacity(2);

    if let Some(v3) = impact.base_metric_v3.and_then(|m| m.cvss_v3) {
        candidates.push(ScoreCandidate {
            is_v3: true,
            version: VERSION_V3.to_string(),
            base_score: v3.base_score,
            severity: v3.base_severity,
            vector: v3.vector_string,
        });
    }

    if let Some(metric) = impact.base_metric_v2 {
        let outer_severity = metric.severity;
        if let Some(v2) = metric.cvss_v2 {
            candidates.push(ScoreCandidate {
                is_v3: false,
                version: VERSION_V2.to_string(),
                base_score: v2.base_score,
                severity: v2.severity.or(outer_severity),
                vector: v2.vector_string,
            });
        }
    }

    candidates
}

// NVD JSON 1.1 schema, every level optional and read leniently

#[derive(Debug, Default, Deserialize)]
struct NvdItem {
    #[serde(default, deserialize_with = "lenient::field")]
    cve: Option<CveBody>,
    #[serde(default, deserialize_with = "lenient::field")]
    impact: Option<Impact>,
    #[serde(rename = "publishedDate", default, deserialize_with = "lenient::field")]
    published_date: Option<String>,
    #[serde(rename = "lastModifiedDate", default, deserialize_with = "lenient::field")]
    last_modified_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CveBody {
    #[serde(rename = "CVE_data_meta", default, deserialize_with = "lenient::field")]
    meta: Option<CveMeta>,
    #[serde(default, deserialize_with = "lenient::field")]
    description: Option<Descriptions>,
    #[serde(default, deserialize_with = "lenient::field")]
    references: Option<References>,
}

#[derive(Debug, Default, Deserialize)]
struct CveMeta {
    #[serde(rename = "ID", default, deserialize_with = "lenient::field")]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Descriptions {
    #[serde(default, deserialize_with = "lenient::list")]
    description_data: Option<Vec<LangString>>,
}

#[derive(Debug, Default, Deserialize)]
struct LangString {
    #[serde(default, deserialize_with = "lenient::field")]
    lang: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct References {
    #[serde(default, deserialize_with = "lenient::list")]
    reference_data: Option<Vec<Reference>>,
}

#[derive(Debug, Default, Deserialize)]
struct Reference {
    #[serde(default, deserialize_with = "lenient::field")]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Impact {
    #[serde(rename = "baseMetricV3", default, deserialize_with = "lenient::field")]
    base_metric_v3: Option<BaseMetricV3>,
    #[serde(rename = "baseMetricV2", default, deserialize_with = "lenient::field")]
    base_metric_v2: Option<BaseMetricV2>,
}

#[derive(Debug, Default, Deserialize)]
struct BaseMetricV3 {
    #[serde(rename = "cvssV3", default, deserialize_with = "lenient::field")]
    cvss_v3: Option<CvssV3>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssV3 {
    #[serde(default, with = "cvss::lenient_score")]
    base_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::field")]
    base_severity: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    vector_string: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BaseMetricV2 {
    #[serde(rename = "cvssV2", default, deserialize_with = "lenient::field")]
    cvss_v2: Option<CvssV2>,
    #[serde(default, deserialize_with = "lenient::field")]
    severity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssV2 {
    #[serde(default, with = "cvss::lenient_score")]
    base_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::field")]
    severity: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    vector_string: Option<String>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
