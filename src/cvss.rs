//! Best-score selection for CVSS score sets
//!
//! Sources publish several candidate scores per vulnerability (NVD: a v3 and a
//! v2 block; MSRC: a list of score sets). Selection is a fold over the
//! candidates with [`compare`] deciding whether a candidate displaces the
//! current best:
//!
//! - candidates without a numeric base score never participate
//! - a v3 candidate displaces any non-v3 candidate
//! - between two v3 candidates the strictly higher base score wins
//! - otherwise the incumbent stays, so the first candidate seen wins ties

use crate::types::Cvss;
use std::cmp::Ordering;

/// Version label for CVSS v3.0/v3.1 scores
pub const VERSION_V3: &str = "3.x";
/// Version label for CVSS v2 scores
pub const VERSION_V2: &str = "2.0";

/// One score as published by a source, before selection
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreCandidate {
    /// Whether this is a CVSS v3 score
    pub is_v3: bool,
    /// Version label to emit when selected
    pub version: String,
    /// Base score, absent when the source left it null
    pub base_score: Option<f64>,
    /// Severity label
    pub severity: Option<String>,
    /// Vector string
    pub vector: Option<String>,
}

impl ScoreCandidate {
    /// Candidate from a vector string, classifying it as v3 when the vector says so
    pub fn from_vector(
        base_score: Option<f64>,
        severity: Option<String>,
        vector: Option<String>,
    ) -> Self {
        let is_v3 = vector.as_deref().is_some_and(is_v3_vector);
        Self {
            is_v3,
            version: if is_v3 { VERSION_V3 } else { "" }.to_string(),
            base_score,
            severity,
            vector,
        }
    }

    fn into_cvss(self, base_score: f64) -> Cvss {
        Cvss {
            version: self.version,
            base_score,
            severity: self.severity.unwrap_or_default(),
            vector_string: self.vector.unwrap_or_default(),
        }
    }
}

/// Whether a vector string denotes a CVSS v3 score
///
/// Accepts the standard `CVSS:3.x/...` prefix and vendor spellings containing
/// `cvssv3` in any case.
pub fn is_v3_vector(vector: &str) -> bool {
    vector.contains("CVSS:3") || vector.to_ascii_lowercase().contains("cvssv3")
}

/// Rank `candidate` against the current best
///
/// `Ordering::Greater` means the candidate replaces the incumbent; anything
/// else keeps the incumbent. Both arguments must carry a base score.
pub fn compare(candidate: &ScoreCandidate, incumbent: &ScoreCandidate) -> Ordering {
    match (candidate.is_v3, incumbent.is_v3) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => {
            let a = candidate.base_score.unwrap_or(f64::NEG_INFINITY);
            let b = incumbent.base_score.unwrap_or(f64::NEG_INFINITY);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (false, false) => Ordering::Equal,
    }
}

/// Select the best score among `candidates`, or None when none has a base score
pub fn select_best<I>(candidates: I) -> Option<Cvss>
where
    I: IntoIterator<Item = ScoreCandidate>,
{
    let best = candidates
        .into_iter()
        .filter(|c| c.base_score.is_some())
        .fold(None::<ScoreCandidate>, |best, candidate| match best {
            Some(incumbent) if compare(&candidate, &incumbent) != Ordering::Greater => {
                Some(incumbent)
            }
            _ => Some(candidate),
        })?;

    let score = best.base_score?;
    Some(best.into_cvss(score))
}

/// Deserialize a score that may be a JSON number, a numeric string, or null
pub(crate) mod lenient_score {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }
}
