use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, Fetcher};
use crate::types::{Framework, NormalizedRecord, SourceId, TechniqueRecord};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::io::Cursor;
use tracing::{debug, info, warn};

use super::{SourceAdapter, lenient};

/// Provenance tag for ATT&CK records
pub const SOURCE: &str = "MITRE";

/// External-reference and kill-chain namespaces that identify ATT&CK data
pub const ATTACK_NAMESPACES: [&str; 2] = ["mitre-attack", "mitre-ics-attack"];

/// ZIP local-file-header signature
const ZIP_MAGIC: &[u8; 2] = b"PK";

/// A STIX bundle as handed to the adapter
#[derive(Clone, Debug)]
pub enum StixPayload {
    /// Raw bytes: a ZIP archive holding the bundle, or the bundle's JSON text
    Bytes(Vec<u8>),
    /// Already-parsed JSON
    Json(Value),
}

/// Reads an ATT&CK STIX 2.1 bundle for one matrix
pub struct AttackAdapter {
    fetcher: Fetcher,
    url: String,
    framework: Framework,
}

impl AttackAdapter {
    /// Create an adapter for the bundle at `url`, tagging records with `framework`
    pub fn new(fetcher: Fetcher, url: impl Into<String>, framework: Framework) -> Self {
        Self {
            fetcher,
            url: url.into(),
            framework,
        }
    }
}

#[async_trait]
impl SourceAdapter for AttackAdapter {
    fn id(&self) -> SourceId {
        match self.framework {
            Framework::Enterprise => SourceId::AttackEnterprise,
            Framework::Ics => SourceId::AttackIcs,
        }
    }

    async fn collect(&self) -> Result<Vec<NormalizedRecord>> {
        let bytes = self
            .fetcher
            .fetch_bytes(&self.url, FetchOptions::bytes())
            .await?;

        info!("Parsing MITRE STIX feed for {}", self.framework);
        let bundle = decode_payload(StixPayload::Bytes(bytes), self.framework)?;
        Ok(normalize_bundle(&bundle, self.framework))
    }
}

/// Turn a payload into a bundle object
///
/// Byte payloads starting with `PK` are always read as ZIP archives; the first
/// member whose name ends in `.json` is the bundle. Other byte payloads are
/// decoded as JSON text. Parsed JSON must be an object.
pub fn decode_payload(payload: StixPayload, framework: Framework) -> Result<Value> {
    let context = format!("ATT&CK {} bundle", framework);

    let bundle = match payload {
        StixPayload::Bytes(bytes) => {
            if bytes.is_empty() {
                return Err(Error::EmptyResult(format!(
                    "No MITRE STIX data received for {}",
                    framework
                )));
            }
            if bytes.starts_with(ZIP_MAGIC) {
                info!(
                    "Detected ZIP format for MITRE STIX ({}); decompressing",
                    framework
                );
                unzip_bundle(&bytes, &context)?
            } else {
                serde_json::from_slice(&bytes).map_err(|e| Error::decode(&context, e))?
            }
        }
        StixPayload::Json(value) => value,
    };

    let Some(map) = bundle.as_object() else {
        return Err(Error::UnexpectedPayload(format!(
            "{} is a JSON {}, expected an object",
            context,
            json_type_name(&bundle)
        )));
    };
    if map.is_empty() {
        return Err(Error::decode(context, "bundle is empty"));
    }

    Ok(bundle)
}

fn unzip_bundle(bytes: &[u8], context: &str) -> Result<Value> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::decode(context, e))?;

    // Central directory order, so "first JSON member" is well defined
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(|e| Error::decode(context, e))?;
        if file.is_dir() || !file.name().ends_with(".json") {
            continue;
        }

        debug!(member = %file.name(), "reading STIX bundle from ZIP member");
        return serde_json::from_reader(file).map_err(|e| Error::decode(context, e));
    }

    Err(Error::decode(context, "No JSON file found inside STIX ZIP"))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Map every `attack-pattern` object of a bundle, in order
pub fn normalize_bundle(bundle: &Value, framework: Framework) -> Vec<NormalizedRecord> {
    bundle
        .get("objects")
        .and_then(Value::as_array)
        .map(|objects| {
            objects
                .iter()
                .filter(|obj| obj.get("type").and_then(Value::as_str) == Some("attack-pattern"))
                .filter_map(|obj| normalize_technique(obj, framework))
                .map(NormalizedRecord::Technique)
                .collect()
        })
        .unwrap_or_default()
}

/// Map one STIX `attack-pattern` object
///
/// Fields of the wrong JSON type read as empty; list elements of the wrong
/// type are dropped. Returns None only when `object` is not an object.
pub fn normalize_technique(object: &Value, framework: Framework) -> Option<TechniqueRecord> {
    let pattern = match AttackPattern::deserialize(object) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "Skipping malformed attack-pattern");
            return None;
        }
    };

    let technique_id = pattern
        .external_references
        .unwrap_or_default()
        .into_iter()
        .find(|r| is_attack_namespace(r.source_name.as_deref()))
        .and_then(|r| r.external_id)
        .unwrap_or_default();

    let tactics = pattern
        .kill_chain_phases
        .unwrap_or_default()
        .into_iter()
        .filter(|p| is_attack_namespace(p.kill_chain_name.as_deref()))
        .filter_map(|p| p.phase_name)
        .collect();

    Some(TechniqueRecord {
        source: SOURCE.to_string(),
        framework,
        technique_id,
        name: pattern.name.unwrap_or_default(),
        description: pattern.description.unwrap_or_default().trim().to_string(),
        tactics,
        platforms: pattern.x_mitre_platforms.unwrap_or_default(),
        data_sources: pattern.x_mitre_data_sources.unwrap_or_default(),
        created_date: pattern.created.unwrap_or_default(),
        modified_date: pattern.modified.unwrap_or_default(),
    })
}

fn is_attack_namespace(name: Option<&str>) -> bool {
    name.is_some_and(|n| ATTACK_NAMESPACES.contains(&n))
}

// STIX types for deserialization, fields read leniently

#[derive(Debug, Deserialize)]
struct ExternalReference {
    #[serde(default, deserialize_with = "lenient::field")]
    source_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    external_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KillChainPhase {
    #[serde(default, deserialize_with = "lenient::field")]
    kill_chain_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    phase_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttackPattern {
    #[serde(default, deserialize_with = "lenient::field")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    external_references: Option<Vec<ExternalReference>>,
    #[serde(default, deserialize_with = "lenient::list")]
    kill_chain_phases: Option<Vec<KillChainPhase>>,
    #[serde(default, deserialize_with = "lenient::list")]
    x_mitre_platforms: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::list")]
    x_mitre_data_sources: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::field")]
    created: Option<String>,
    #[serde(default, deserialize_with = "lenient::field")]
    modified: Option<String>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
