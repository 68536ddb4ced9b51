use crate::error::{Error, Result};
use crate::feed::{FeedEntry, FeedReader, ParsedFeed};
use crate::fetch::Fetcher;
use crate::types::{AdvisoryKind, AdvisoryRecord, NormalizedRecord, SourceId};
use async_trait::async_trait;
use chrono::SecondsFormat;
use tracing::{info, warn};

use super::SourceAdapter;

/// Provenance tag for CISA records
pub const SOURCE: &str = "CISA";

/// Reads one CISA advisory feed
pub struct CisaAdapter {
    reader: FeedReader,
    url: String,
    kind: AdvisoryKind,
}

impl CisaAdapter {
    /// Create an adapter for the feed at `url`; `kind` decides the record type
    pub fn new(fetcher: Fetcher, url: impl Into<String>, kind: AdvisoryKind) -> Self {
        Self {
            reader: FeedReader::new(fetcher),
            url: url.into(),
            kind,
        }
    }
}

#[async_trait]
impl SourceAdapter for CisaAdapter {
    fn id(&self) -> SourceId {
        match self.kind {
            AdvisoryKind::Alert => SourceId::CisaAlerts,
            AdvisoryKind::Activity => SourceId::CisaActivity,
        }
    }

    async fn collect(&self) -> Result<Vec<NormalizedRecord>> {
        info!(
            "Fetching and parsing CISA feed: {} as {}",
            self.url,
            type_name(self.kind)
        );
        let feed = self.reader.read(&self.url).await;
        normalize_feed(&feed, self.kind, &self.url)
    }
}

fn type_name(kind: AdvisoryKind) -> &'static str {
    match kind {
        AdvisoryKind::Alert => "CISA_ALERT",
        AdvisoryKind::Activity => "CISA_ACTIVITY",
    }
}

/// Map the entries of a parsed feed, in order
///
/// A feed flagged as malformed with no entries is an error. A flagged feed that
/// still carries entries is logged and processed.
pub fn normalize_feed(
    feed: &ParsedFeed,
    kind: AdvisoryKind,
    url: &str,
) -> Result<Vec<NormalizedRecord>> {
    let reason = || {
        feed.bozo_exception
            .clone()
            .unwrap_or_else(|| "feed flagged as malformed".to_string())
    };

    if feed.bozo {
        if feed.entries.is_empty() {
            return Err(Error::MalformedFeed {
                url: url.to_string(),
                reason: reason(),
            });
        }
        warn!(
            "Warning parsing feed {} (might be malformed or fetch error): {}",
            url,
            reason()
        );
    }

    Ok(feed
        .entries
        .iter()
        .map(|entry| {
            let record = normalize_entry(entry);
            match kind {
                AdvisoryKind::Alert => NormalizedRecord::CisaAlert(record),
                AdvisoryKind::Activity => NormalizedRecord::CisaActivity(record),
            }
        })
        .collect())
}

/// Map one feed entry
pub fn normalize_entry(entry: &FeedEntry) -> AdvisoryRecord {
    AdvisoryRecord {
        source: SOURCE.to_string(),
        title: entry.title.clone().unwrap_or_default(),
        link: entry.link.clone().unwrap_or_default(),
        published_date: published_date(entry),
        summary: entry
            .summary
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

// ISO-8601 in UTC from the broken-down date, else the raw string
fn published_date(entry: &FeedEntry) -> String {
    let raw = || entry.published.clone().unwrap_or_default();

    let Some(parsed) = entry.published_parsed else {
        return raw();
    };

    match parsed.to_utc() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, false),
        None => {
            warn!(
                "Could not convert date for feed entry '{}'; using raw: {}",
                entry.title.as_deref().unwrap_or_default(),
                entry.published.as_deref().unwrap_or_default()
            );
            raw()
        }
    }
}
