//! Configuration types for intel-ingest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable holding the optional MSRC API key
pub const MSRC_API_KEY_ENV: &str = "MSRC_API_KEY";

/// User-Agent sent with every request unless the caller overrides it
pub const DEFAULT_USER_AGENT: &str =
    "ThreatIntelIngestor/1.0 (+https://github.com/your-repo; contact your-email@example.com)";

/// HTTP transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Default User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

/// Upstream endpoints, one per source
///
/// Defaults point at the public NVD, MITRE, CISA and MSRC endpoints. Tests
/// override them with mock-server URLs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Gzip-compressed NVD JSON 1.1 "recent" feed
    #[serde(default = "default_nvd_url")]
    pub nvd_url: String,

    /// ATT&CK Enterprise STIX 2.1 bundle (ZIP-wrapped or plain JSON)
    #[serde(default = "default_attack_enterprise_url")]
    pub attack_enterprise_url: String,

    /// ATT&CK ICS STIX 2.1 bundle (ZIP-wrapped or plain JSON)
    #[serde(default = "default_attack_ics_url")]
    pub attack_ics_url: String,

    /// CISA alerts RSS feed
    #[serde(default = "default_cisa_alerts_url")]
    pub cisa_alerts_url: String,

    /// CISA current-activity RSS feed
    #[serde(default = "default_cisa_activity_url")]
    pub cisa_activity_url: String,

    /// MSRC update-guide vulnerabilities endpoint (without query string)
    #[serde(default = "default_msrc_base_url")]
    pub msrc_base_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            nvd_url: default_nvd_url(),
            attack_enterprise_url: default_attack_enterprise_url(),
            attack_ics_url: default_attack_ics_url(),
            cisa_alerts_url: default_cisa_alerts_url(),
            cisa_activity_url: default_cisa_activity_url(),
            msrc_base_url: default_msrc_base_url(),
        }
    }
}

/// Main configuration for an ingestion run
///
/// Fields are organized into sub-configs:
/// - [`http`](HttpConfig): User-Agent and timeout
/// - [`sources`](SourcesConfig): upstream URLs
///
/// The MSRC API key is never read from or written to a config file; it comes
/// from the environment via [`Config::with_env_overrides`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory receiving the day's JSONL files (default: "./intel")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Days to look back for date-filterable APIs (MSRC)
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Run the sources concurrently instead of one after another
    #[serde(default)]
    pub parallel: bool,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Upstream endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Optional MSRC API key (sent as the `api-key` header)
    #[serde(skip)]
    pub msrc_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            lookback_days: default_lookback_days(),
            parallel: false,
            http: HttpConfig::default(),
            sources: SourcesConfig::default(),
            msrc_api_key: None,
        }
    }
}

impl Config {
    /// Load a configuration from a TOML file; missing keys take their defaults
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })
    }

    /// Pick up the MSRC API key from the process environment
    ///
    /// An unset or empty variable leaves the key absent, which downgrades MSRC
    /// access to unauthenticated requests.
    pub fn with_env_overrides(mut self) -> Self {
        self.msrc_api_key = std::env::var(MSRC_API_KEY_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self
    }

    /// Check the configuration for values that would make every source fail
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::config("output directory must not be empty", "output_dir"));
        }

        if self.http.timeout.is_zero() {
            return Err(Error::config("timeout must be positive", "http.timeout"));
        }

        let urls = [
            ("sources.nvd_url", &self.sources.nvd_url),
            ("sources.attack_enterprise_url", &self.sources.attack_enterprise_url),
            ("sources.attack_ics_url", &self.sources.attack_ics_url),
            ("sources.cisa_alerts_url", &self.sources.cisa_alerts_url),
            ("sources.cisa_activity_url", &self.sources.cisa_activity_url),
            ("sources.msrc_base_url", &self.sources.msrc_base_url),
        ];
        for (key, value) in urls {
            if value.trim().is_empty() {
                return Err(Error::config("source URL must not be empty", key));
            }
            url::Url::parse(value)
                .map_err(|e| Error::config(format!("invalid URL '{}': {}", value, e), key))?;
        }

        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./intel")
}

fn default_lookback_days() -> u32 {
    1
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_nvd_url() -> String {
    "https://nvd.nist.gov/feeds/json/cve/1.1/nvdcve-1.1-recent.json.gz".to_string()
}

fn default_attack_enterprise_url() -> String {
    "https://cti-taxii.mitre.org/stix/collections/95ecc380-afe9-11e4-9b6c-751b66dd541e/stix-2.1.zip"
        .to_string()
}

fn default_attack_ics_url() -> String {
    "https://cti-taxii.mitre.org/stix/collections/02c3ef24-9cd4-48f3-a99f-679424e34d7e/stix-2.1.zip"
        .to_string()
}

fn default_cisa_alerts_url() -> String {
    "https://www.cisa.gov/uscert/ncas/alerts.xml".to_string()
}

fn default_cisa_activity_url() -> String {
    "https://www.cisa.gov/uscert/ncas/current-activity.xml".to_string()
}

fn default_msrc_base_url() -> String {
    "https://api.msrc.microsoft.com/update-guide/v1/vulnerabilities".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
