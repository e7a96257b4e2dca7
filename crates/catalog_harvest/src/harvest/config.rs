//! Configuration for a catalogue harvest run

use super::error::HarvestError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Site root that relative catalogue links are resolved against.
const ROOT_URL: &str = "https://apps.ualberta.ca";

/// Landing page listing every faculty.
const CATALOG_URL: &str = "https://apps.ualberta.ca/catalogue";

/// Top-level harvest configuration.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarvestConfig {
    pub root_url: String,
    pub catalog_url: String,
    /// Fixed pause before every request
    pub request_delay_secs: f64,
    /// Extra attempts for transient failures (0 disables retrying)
    pub max_retries: u32,
    /// Base delay for retry backoff (doubles per attempt)
    pub retry_base_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Faculty codes to keep after the faculty stage; empty keeps all
    pub faculty_allow_list: Vec<String>,
    /// Escalate to a hard failure when a stage skips more items than this
    pub max_skips_per_stage: Option<usize>,
    /// Record unreachable subject/course pages as skips instead of aborting
    pub skip_failed_pages: bool,
    pub output_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            root_url: ROOT_URL.to_string(),
            catalog_url: CATALOG_URL.to_string(),
            request_delay_secs: 2.0,
            max_retries: 2,
            retry_base_delay_ms: 500,
            request_timeout_secs: 30,
            user_agent: concat!("catalog_harvest/", env!("CARGO_PKG_VERSION")).to_string(),
            faculty_allow_list: Vec::new(),
            max_skips_per_stage: None,
            skip_failed_pages: false,
            output_dir: PathBuf::from("data"),
        }
    }
}

impl HarvestConfig {
    /// Loads a configuration from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the JSON config file
    ///
    /// # Returns
    /// * `Ok(HarvestConfig)` - Loaded configuration, defaults filled in
    /// * `Err` - If the file can't be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self, HarvestError> {
        let content = fs::read_to_string(path).map_err(|e| HarvestError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: HarvestConfig =
            serde_json::from_str(&content).map_err(|e| HarvestError::Config {
                message: format!("cannot parse {}: {}", path.display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the URLs parse and the delays are usable.
    pub fn validate(&self) -> Result<(), HarvestError> {
        self.root()?;
        Url::parse(&self.catalog_url).map_err(|e| HarvestError::Config {
            message: format!("catalogUrl {:?}: {}", self.catalog_url, e),
        })?;
        Duration::try_from_secs_f64(self.request_delay_secs).map_err(|e| {
            HarvestError::Config {
                message: format!("requestDelaySecs {}: {}", self.request_delay_secs, e),
            }
        })?;
        Ok(())
    }

    /// The parsed site root.
    pub fn root(&self) -> Result<Url, HarvestError> {
        Url::parse(&self.root_url).map_err(|e| HarvestError::Config {
            message: format!("rootUrl {:?}: {}", self.root_url, e),
        })
    }

    /// Zero for a delay that `validate` would reject.
    pub fn request_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_delay_secs).unwrap_or_default()
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns true if `faculty_code` survives the allow-list.
    pub fn allows_faculty(&self, faculty_code: &str) -> bool {
        self.faculty_allow_list.is_empty()
            || self
                .faculty_allow_list
                .iter()
                .any(|code| code.eq_ignore_ascii_case(faculty_code))
    }
}
