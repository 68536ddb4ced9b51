//! Per-source adapters
//!
//! Each adapter retrieves its upstream payload and maps it onto
//! [`NormalizedRecord`]s. Item fields are read through [`lenient`]
//! deserializers, so a field of the wrong JSON type reads as absent and the
//! item still yields its record.

use crate::error::Result;
use crate::types::{NormalizedRecord, SourceId};
use async_trait::async_trait;

/// ATT&CK technique taxonomy (STIX bundles)
pub mod attack;
/// CISA advisory feeds (RSS/Atom)
pub mod cisa;
/// MSRC update guide (paginated REST)
pub mod msrc;
/// NVD CVE feed (gzip JSON)
pub mod nvd;

pub use attack::{AttackAdapter, StixPayload};
pub use cisa::CisaAdapter;
pub use msrc::MsrcAdapter;
pub use nvd::NvdAdapter;

/// A source of normalized records
///
/// Implementations perform their own retrieval and return the records for one
/// output file. Any error means "skip this source's file"; it never affects
/// other sources.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter reads
    fn id(&self) -> SourceId;

    /// Retrieve and normalize the source's records
    async fn collect(&self) -> Result<Vec<NormalizedRecord>>;
}

/// Read an optional string field, treating null and non-strings as absent
pub(crate) fn str_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

/// Field deserializers that read a wrongly typed value as absent
pub(crate) mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// None when the field is null or does not fit `T`
    pub fn field<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| T::deserialize(v).ok()))
    }

    /// List whose elements that do not fit `T` are dropped; None when not an array
    pub fn list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|v| T::deserialize(v).ok())
                    .collect(),
            ),
            _ => None,
        })
    }

}
