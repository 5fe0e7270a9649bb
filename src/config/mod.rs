use crate::models::{ConnectionConfig, SourceType};
use crate::preview::PreviewFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Configuration {
    pub target: TargetConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub mapping: MappingOverrides,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// The server the library is imported into.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "apikey")]
    pub api_key: String,
    #[serde(rename = "pollIntervalMs")]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(rename = "dbPath")]
    pub db_path: Option<PathBuf>,
    pub url: Option<String>,
    #[serde(rename = "apikey")]
    pub api_key: Option<String>,
}

/// Manual corrections applied on top of auto-matching.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingOverrides {
    /// Source root folder path to target root folder id
    #[serde(rename = "rootFolders", default)]
    pub root_folders: BTreeMap<String, i32>,
    /// Source quality profile name to target quality profile id
    #[serde(rename = "qualityProfiles", default)]
    pub quality_profiles: BTreeMap<String, i32>,
    #[serde(rename = "enabledProfiles", default)]
    pub enabled_profiles: Vec<String>,
    #[serde(rename = "disabledProfiles", default)]
    pub disabled_profiles: Vec<String>,
}

/// View preferences for the preview and the completion report.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DisplayConfig {
    pub filter: Option<PreviewFilter>,
    #[serde(rename = "maxErrors")]
    pub max_errors: Option<usize>,
}

impl Configuration {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Configuration = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

impl TargetConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(1000))
    }
}

impl SourceConfig {
    /// The configured connection, or `None` when the database path should
    /// be detected instead.
    pub fn connection(&self) -> anyhow::Result<Option<ConnectionConfig>> {
        match (&self.db_path, &self.url, &self.api_key) {
            (Some(_), Some(_), _) => Err(anyhow::anyhow!(
                "source: set either dbPath or url/apikey, not both"
            )),
            (Some(db_path), None, _) => Ok(Some(ConnectionConfig::Sqlite {
                source_type: self.source_type,
                db_path: db_path.clone(),
            })),
            (None, Some(url), Some(api_key)) => Ok(Some(ConnectionConfig::Api {
                source_type: self.source_type,
                url: url.clone(),
                api_key: api_key.clone(),
            })),
            (None, Some(_), None) => Err(anyhow::anyhow!("source: url requires apikey")),
            (None, None, Some(_)) => Err(anyhow::anyhow!("source: apikey requires url")),
            (None, None, None) => Ok(None),
        }
    }
}

impl DisplayConfig {
    pub fn filter(&self) -> PreviewFilter {
        self.filter.unwrap_or_default()
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors.unwrap_or(50)
    }
}
