//! Core types for intel-ingest
//!
//! The normalized record schema written to the JSONL files, the identifiers of
//! each upstream source, and the events published while a run progresses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ErrorKind;

/// A single CVSS score selected for a record
///
/// Serialized with the upstream field spelling (`baseScore`, `vectorString`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cvss {
    /// Scoring standard version ("3.x", "2.0", or empty when unknown)
    pub version: String,
    /// Numeric base score (0.0 to 10.0)
    pub base_score: f64,
    /// Severity label as published by the source (may be empty)
    pub severity: String,
    /// CVSS vector string (may be empty)
    pub vector_string: String,
}

/// ATT&CK matrix a technique belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Enterprise matrix
    Enterprise,
    /// Industrial control systems matrix
    Ics,
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framework::Enterprise => write!(f, "enterprise"),
            Framework::Ics => write!(f, "ics"),
        }
    }
}

/// Which CISA feed an advisory came from; decides the record's `type`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvisoryKind {
    /// CISA alerts feed (`CISA_ALERT`)
    Alert,
    /// CISA current-activity feed (`CISA_ACTIVITY`)
    Activity,
}

/// Normalized CVE entry from the NVD feed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// Provenance tag ("NVD")
    pub source: String,
    /// CVE identifier
    pub cve_id: String,
    /// Selected CVSS score; serialized as `{}` when none was found
    #[serde(default, with = "cvss_object")]
    pub cvss: Option<Cvss>,
    /// Publication timestamp as published by NVD
    pub published_date: String,
    /// Last modification timestamp as published by NVD
    pub last_modified_date: String,
    /// English description, empty when none exists
    pub description: String,
    /// Reference URLs in source order; entries without a URL stay as `null`
    pub references: Vec<Option<String>>,
}

/// Normalized ATT&CK technique (STIX `attack-pattern`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TechniqueRecord {
    /// Provenance tag ("MITRE")
    pub source: String,
    /// Matrix supplied by the caller
    pub framework: Framework,
    /// External technique id (e.g. "T1059"), empty when no ATT&CK reference exists
    pub technique_id: String,
    /// Technique name
    pub name: String,
    /// Trimmed technique description
    pub description: String,
    /// Kill-chain phase names within the ATT&CK namespaces, in source order
    pub tactics: Vec<String>,
    /// Platforms the technique applies to
    pub platforms: Vec<String>,
    /// Data sources useful for detection
    pub data_sources: Vec<String>,
    /// STIX `created` timestamp
    pub created_date: String,
    /// STIX `modified` timestamp
    pub modified_date: String,
}

/// Normalized CISA advisory feed entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    /// Provenance tag ("CISA")
    pub source: String,
    /// Entry title
    pub title: String,
    /// Entry link
    pub link: String,
    /// ISO-8601 UTC publication date, or the feed's raw date string
    pub published_date: String,
    /// Whitespace-trimmed summary; markup is passed through
    pub summary: String,
}

/// Normalized MSRC security update entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulletinRecord {
    /// Provenance tag ("Microsoft")
    pub source: String,
    /// CVE identifier
    pub cve_id: String,
    /// Vulnerability name
    pub title: String,
    /// Trimmed description text
    pub description: String,
    /// MSRC release date
    pub published_date: String,
    /// Best CVSS score set; serialized as `{}` when none was found
    #[serde(default, with = "cvss_object")]
    pub cvss: Option<Cvss>,
    /// "{family} - {product}" strings
    pub affected_products: Vec<String>,
    /// Exploitation status, verbatim from MSRC
    pub exploited_status: String,
    /// Public-disclosure status, verbatim from MSRC
    pub publicly_disclosed: String,
    /// Update-guide URL for the CVE, empty without a CVE number
    pub msrc_url: String,
}

/// A record in one of the output JSONL files
///
/// Every variant serializes as a flat JSON object whose `type` field names the
/// variant, followed by the record's own fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NormalizedRecord {
    /// NVD vulnerability
    #[serde(rename = "CVE")]
    Vulnerability(VulnerabilityRecord),
    /// ATT&CK technique
    #[serde(rename = "ATT&CK")]
    Technique(TechniqueRecord),
    /// CISA alert
    #[serde(rename = "CISA_ALERT")]
    CisaAlert(AdvisoryRecord),
    /// CISA current activity item
    #[serde(rename = "CISA_ACTIVITY")]
    CisaActivity(AdvisoryRecord),
    /// MSRC bulletin
    #[serde(rename = "MSRC_BULLETIN")]
    Bulletin(BulletinRecord),
}

impl NormalizedRecord {
    /// Value of the serialized `type` field
    pub fn type_tag(&self) -> &'static str {
        match self {
            NormalizedRecord::Vulnerability(_) => "CVE",
            NormalizedRecord::Technique(_) => "ATT&CK",
            NormalizedRecord::CisaAlert(_) => "CISA_ALERT",
            NormalizedRecord::CisaActivity(_) => "CISA_ACTIVITY",
            NormalizedRecord::Bulletin(_) => "MSRC_BULLETIN",
        }
    }

    /// Value of the serialized `source` field
    pub fn source(&self) -> &str {
        match self {
            NormalizedRecord::Vulnerability(r) => &r.source,
            NormalizedRecord::Technique(r) => &r.source,
            NormalizedRecord::CisaAlert(r) | NormalizedRecord::CisaActivity(r) => &r.source,
            NormalizedRecord::Bulletin(r) => &r.source,
        }
    }
}

/// Upstream source, one per output file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// NVD CVE feed
    Nvd,
    /// ATT&CK Enterprise bundle
    AttackEnterprise,
    /// ATT&CK ICS bundle
    AttackIcs,
    /// CISA alerts feed
    CisaAlerts,
    /// CISA current-activity feed
    CisaActivity,
    /// MSRC update guide
    Msrc,
}

impl SourceId {
    /// All sources in the order a run processes them
    pub const ALL: [SourceId; 6] = [
        SourceId::Nvd,
        SourceId::AttackEnterprise,
        SourceId::AttackIcs,
        SourceId::CisaAlerts,
        SourceId::CisaActivity,
        SourceId::Msrc,
    ];

    /// Output file name prefix (before `_<YYYYMMDD>.jsonl`)
    pub fn file_stem(&self) -> &'static str {
        match self {
            SourceId::Nvd => "cve_nvd",
            SourceId::AttackEnterprise => "attack_enterprise",
            SourceId::AttackIcs => "attack_ics",
            SourceId::CisaAlerts => "cisa_alerts",
            SourceId::CisaActivity => "cisa_activity",
            SourceId::Msrc => "msrc_bulletins",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SourceId::Nvd => "NVD",
            SourceId::AttackEnterprise => "ATT&CK enterprise",
            SourceId::AttackIcs => "ATT&CK ics",
            SourceId::CisaAlerts => "CISA alerts",
            SourceId::CisaActivity => "CISA current activity",
            SourceId::Msrc => "MSRC",
        };
        f.write_str(label)
    }
}

/// Final state of one source after a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    /// Output file written
    Written {
        /// Path of the JSONL file
        path: PathBuf,
        /// Number of lines written
        records: usize,
    },
    /// No output file for this source
    Skipped {
        /// Failure class
        kind: ErrorKind,
        /// Human-readable cause
        reason: String,
    },
}

/// Outcome of one source within a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome {
    /// The source
    pub source: SourceId,
    /// What happened
    #[serde(flatten)]
    pub status: SourceStatus,
}

impl SourceOutcome {
    /// Whether an output file was produced
    pub fn is_written(&self) -> bool {
        matches!(self.status, SourceStatus::Written { .. })
    }
}

/// Outcomes of a whole run, in source order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// UTC date used for output file names
    pub date: NaiveDate,
    /// One outcome per source
    pub outcomes: Vec<SourceOutcome>,
}

impl RunSummary {
    /// Number of sources that produced a file
    pub fn written(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    /// Number of sources that were skipped
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.written()
    }

    /// Outcome for a given source, if it ran
    pub fn outcome(&self, source: SourceId) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|o| o.source == source)
    }
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A source is about to be fetched
    SourceStarted {
        /// The source
        source: SourceId,
    },

    /// A source's output file was written
    SourceCompleted {
        /// The source
        source: SourceId,
        /// Path of the JSONL file
        path: PathBuf,
        /// Number of records written
        records: usize,
    },

    /// A source produced no output file
    SourceSkipped {
        /// The source
        source: SourceId,
        /// Failure class
        kind: ErrorKind,
        /// Machine-readable error code
        code: String,
        /// Human-readable cause
        reason: String,
    },

    /// All sources have been attempted
    RunComplete {
        /// Sources that produced a file
        succeeded: usize,
        /// Sources that were skipped
        skipped: usize,
    },
}

// Serializes a missing score as an empty object and reads `{}` back as None
mod cvss_object {
    use super::Cvss;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(cvss: &Option<Cvss>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match cvss {
            Some(c) => c.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Cvss>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Repr {
            #[serde(default)]
            version: String,
            base_score: Option<f64>,
            #[serde(default)]
            severity: String,
            #[serde(default)]
            vector_string: String,
        }

        let repr = Option::<Repr>::deserialize(deserializer)?;
        Ok(repr.and_then(|r| {
            r.base_score.map(|base_score| Cvss {
                version: r.version,
                base_score,
                severity: r.severity,
                vector_string: r.vector_string,
            })
        }))
    }
}
