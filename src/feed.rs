//! RSS/Atom feed retrieval and parsing.
//!
//! [`FeedReader::read`] fetches a feed and parses it into a [`ParsedFeed`]
//! without ever failing: transport errors and unparseable XML set the
//! `bozo` flag and leave the entry list empty, in the manner of a lenient
//! feed parser. RSS 2.0 is tried first, Atom second.

use crate::fetch::{FetchOptions, Fetcher};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use tracing::debug;

/// Broken-down UTC timestamp (year, month, day, hour, minute, second)
///
/// Components are kept as parsed so that out-of-range values can be detected
/// when converting, rather than when parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeTuple {
    /// Calendar year
    pub year: i32,
    /// Month, 1-12
    pub month: u32,
    /// Day of month, 1-31
    pub day: u32,
    /// Hour, 0-23
    pub hour: u32,
    /// Minute, 0-59
    pub minute: u32,
    /// Second, 0-59
    pub second: u32,
}

impl TimeTuple {
    /// Break a timestamp down in UTC
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        let utc = dt.with_timezone(&Utc);
        Self {
            year: utc.year(),
            month: utc.month(),
            day: utc.day(),
            hour: utc.hour(),
            minute: utc.minute(),
            second: utc.second(),
        }
    }

    /// Reassemble as a UTC timestamp; None when any component is out of range
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let naive = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?.and_hms_opt(
            self.hour,
            self.minute,
            self.second,
        )?;
        Some(Utc.from_utc_datetime(&naive))
    }
}

/// One entry of a parsed feed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedEntry {
    /// Entry title
    pub title: Option<String>,
    /// Primary link
    pub link: Option<String>,
    /// Summary/description, markup untouched
    pub summary: Option<String>,
    /// Publication date exactly as written in the feed
    pub published: Option<String>,
    /// Publication date broken down in UTC, when it could be parsed
    pub published_parsed: Option<TimeTuple>,
}

/// Result of reading a feed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedFeed {
    /// Entries in document order
    pub entries: Vec<FeedEntry>,
    /// Set when fetching or parsing went wrong
    pub bozo: bool,
    /// Description of what went wrong, when `bozo` is set
    pub bozo_exception: Option<String>,
}

impl ParsedFeed {
    fn malformed(reason: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            bozo: true,
            bozo_exception: Some(reason.into()),
        }
    }
}

/// Fetches and parses feeds through the shared [`Fetcher`]
#[derive(Clone, Debug)]
pub struct FeedReader {
    fetcher: Fetcher,
}

impl FeedReader {
    /// Create a reader on top of a fetcher
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch and parse the feed at `url`
    pub async fn read(&self, url: &str) -> ParsedFeed {
        debug!("Reading feed: {}", url);

        match self.fetcher.fetch_bytes(url, FetchOptions::bytes()).await {
            Ok(content) => parse_feed(&content),
            Err(e) => ParsedFeed::malformed(e.to_string()),
        }
    }
}

/// Parse feed content as RSS, falling back to Atom
pub fn parse_feed(content: &[u8]) -> ParsedFeed {
    match parse_as_rss(content) {
        Ok(entries) => {
            debug!("Successfully parsed as RSS, found {} items", entries.len());
            ParsedFeed {
                entries,
                ..Default::default()
            }
        }
        Err(rss_err) => {
            debug!("Failed to parse as RSS: {}, trying Atom", rss_err);
            match parse_as_atom(content) {
                Ok(entries) => {
                    debug!("Successfully parsed as Atom, found {} items", entries.len());
                    ParsedFeed {
                        entries,
                        ..Default::default()
                    }
                }
                Err(atom_err) => ParsedFeed::malformed(format!(
                    "Failed to parse feed as RSS or Atom. RSS error: {}. Atom error: {}",
                    rss_err, atom_err
                )),
            }
        }
    }
}

fn parse_as_rss(content: &[u8]) -> Result<Vec<FeedEntry>, rss::Error> {
    let channel = rss::Channel::read_from(content)?;

    let entries = channel
        .items()
        .iter()
        .map(|item| {
            let published_parsed = item.pub_date().and_then(|date_str| {
                DateTime::parse_from_rfc2822(date_str.trim())
                    .ok()
                    .map(|dt| TimeTuple::from_datetime(&dt))
            });

            FeedEntry {
                title: item.title().map(|t| t.to_string()),
                link: item.link().map(|l| l.to_string()),
                summary: item.description().map(|d| d.to_string()),
                published: item.pub_date().map(|d| d.to_string()),
                published_parsed,
            }
        })
        .collect();

    Ok(entries)
}

fn parse_as_atom(content: &[u8]) -> Result<Vec<FeedEntry>, atom_syndication::Error> {
    let feed = atom_syndication::Feed::read_from(content)?;

    let entries = feed
        .entries()
        .iter()
        .map(|entry| {
            // Prefer the alternate link, fall back to the first one
            let link = entry
                .links()
                .iter()
                .find(|link| link.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|link| link.href().to_string());

            let summary = entry.summary().map(|s| s.as_str().to_string()).or_else(|| {
                entry
                    .content()
                    .and_then(|c| c.value().map(|v| v.to_string()))
            });

            FeedEntry {
                title: Some(entry.title().as_str().to_string()),
                link,
                summary,
                published: entry.published().map(|dt| dt.to_rfc3339()),
                published_parsed: entry.published().map(TimeTuple::from_datetime),
            }
        })
        .collect();

    Ok(entries)
}
