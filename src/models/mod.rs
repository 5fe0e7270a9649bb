use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Which kind of media manager the library is migrated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Movie manager
    #[default]
    Radarr,
    /// Series manager
    Sonarr,
}

impl SourceType {
    /// Media type used by the target system for root folders of this kind.
    pub fn media_type(&self) -> &'static str {
        match self {
            SourceType::Radarr => "movie",
            SourceType::Sonarr => "tv",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Radarr => "radarr",
            SourceType::Sonarr => "sonarr",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to reach the source system.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Sqlite {
        #[serde(rename = "sourceType")]
        source_type: SourceType,
        #[serde(rename = "dbPath")]
        db_path: PathBuf,
    },
    Api {
        #[serde(rename = "sourceType")]
        source_type: SourceType,
        url: String,
        #[serde(rename = "apiKey")]
        api_key: String,
    },
}

impl ConnectionConfig {
    pub fn source_type(&self) -> SourceType {
        match self {
            ConnectionConfig::Sqlite { source_type, .. } => *source_type,
            ConnectionConfig::Api { source_type, .. } => *source_type,
        }
    }

    /// Rejects settings that can never connect, without a round-trip.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ConnectionConfig::Sqlite { db_path, .. } => {
                if db_path.as_os_str().is_empty() {
                    return Err("Database path is required".to_string());
                }
            }
            ConnectionConfig::Api { url, api_key, .. } => {
                let parsed = url::Url::parse(url.trim())
                    .map_err(|e| format!("Invalid URL '{}': {}", url, e))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(format!("URL must use http or https: {}", url));
                }
                if api_key.trim().is_empty() {
                    return Err("API key is required".to_string());
                }
            }
        }
        Ok(())
    }
}

// Keep API keys out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionConfig::Sqlite { source_type, db_path } => f
                .debug_struct("Sqlite")
                .field("source_type", source_type)
                .field("db_path", db_path)
                .finish(),
            ConnectionConfig::Api { source_type, url, .. } => f
                .debug_struct("Api")
                .field("source_type", source_type)
                .field("url", url)
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRootFolder {
    pub id: i32,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQualityProfile {
    pub id: i32,
    pub name: String,
    #[serde(rename = "inUse", default)]
    pub in_use: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRootFolder {
    pub id: i32,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetQualityProfile {
    pub id: i32,
    pub name: String,
}

/// Everything the import needs to know about how source entities land in
/// the target system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMappings {
    #[serde(rename = "rootFolderMapping")]
    pub root_folder_mapping: BTreeMap<String, i32>,
    #[serde(rename = "qualityProfileMapping")]
    pub quality_profile_mapping: BTreeMap<i32, i32>,
    #[serde(rename = "selectedMovieTmdbIds", default, skip_serializing_if = "Option::is_none")]
    pub selected_movie_tmdb_ids: Option<Vec<i32>>,
    #[serde(rename = "selectedSeriesTvdbIds", default, skip_serializing_if = "Option::is_none")]
    pub selected_series_tvdb_ids: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    New,
    Duplicate,
    Skip,
}

impl fmt::Display for PreviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PreviewStatus::New => "new",
            PreviewStatus::Duplicate => "duplicate",
            PreviewStatus::Skip => "skip",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoviePreview {
    #[serde(rename = "tmdbId")]
    pub tmdb_id: i32,
    #[serde(default)]
    pub title: String,
    pub year: Option<i32>,
    pub status: PreviewStatus,
    #[serde(rename = "skipReason", default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPreview {
    #[serde(rename = "tvdbId")]
    pub tvdb_id: i32,
    #[serde(default)]
    pub title: String,
    pub year: Option<i32>,
    pub status: PreviewStatus,
    #[serde(rename = "skipReason", default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSummary {
    #[serde(rename = "totalMovies", default)]
    pub total_movies: usize,
    #[serde(rename = "totalSeries", default)]
    pub total_series: usize,
    #[serde(rename = "newCount", default)]
    pub new_count: usize,
    #[serde(rename = "duplicateCount", default)]
    pub duplicate_count: usize,
    #[serde(rename = "skipCount", default)]
    pub skip_count: usize,
}

/// Diff between the source library and the target library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPreview {
    #[serde(default)]
    pub movies: Vec<MoviePreview>,
    #[serde(default)]
    pub series: Vec<SeriesPreview>,
    #[serde(default)]
    pub summary: PreviewSummary,
}

/// Identifier of a submitted import job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ActivityStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivityStatus::Completed | ActivityStatus::Failed | ActivityStatus::Cancelled
        )
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActivityStatus::Pending => "pending",
            ActivityStatus::InProgress => "in progress",
            ActivityStatus::Completed => "completed",
            ActivityStatus::Failed => "failed",
            ActivityStatus::Cancelled => "cancelled",
        })
    }
}

/// Progress record of a long-running job, owned by the target system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub status: ActivityStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(rename = "startedAt", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "completedAt", default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<ActivityMetadata>,
}

impl Activity {
    pub fn report(&self) -> Option<&ImportReport> {
        self.metadata.as_ref().and_then(|m| m.report.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetadata {
    #[serde(default)]
    pub report: Option<ImportReport>,
}

/// Terminal summary of an import job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    #[serde(rename = "moviesCreated", default)]
    pub movies_created: u32,
    #[serde(rename = "moviesSkipped", default)]
    pub movies_skipped: u32,
    #[serde(rename = "moviesErrored", default)]
    pub movies_errored: u32,
    #[serde(rename = "seriesCreated", default)]
    pub series_created: u32,
    #[serde(rename = "seriesSkipped", default)]
    pub series_skipped: u32,
    #[serde(rename = "seriesErrored", default)]
    pub series_errored: u32,
    #[serde(rename = "filesImported", default)]
    pub files_imported: u32,
    #[serde(rename = "filesTotal", default)]
    pub files_total: u32,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
