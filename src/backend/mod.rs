use crate::config::TargetConfig;
use crate::http::HttpClient;
use crate::models::{
    Activity, ConnectionConfig, ImportMappings, ImportPreview, JobId, SourceQualityProfile,
    SourceRootFolder, SourceType, TargetQualityProfile, TargetRootFolder,
};
use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

#[async_trait]
pub trait MigrationBackend: Send + Sync {
    async fn detect_source_database(&self, source_type: SourceType) -> Result<Option<PathBuf>>;

    async fn connect(&self, config: &ConnectionConfig) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn source_root_folders(&self) -> Result<Vec<SourceRootFolder>>;

    async fn source_quality_profiles(&self) -> Result<Vec<SourceQualityProfile>>;

    async fn target_root_folders(&self, source_type: SourceType) -> Result<Vec<TargetRootFolder>>;

    async fn target_quality_profiles(&self) -> Result<Vec<TargetQualityProfile>>;

    async fn compute_preview(&self, mappings: &ImportMappings) -> Result<ImportPreview>;

    async fn execute_import(&self, mappings: &ImportMappings) -> Result<JobId>;

    /// The stream may never end; callers stop by dropping it.
    fn observe_progress(&self, job: &JobId) -> BoxStream<'_, Result<Activity>>;
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    found: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(rename = "jobId")]
    job_id: String,
}

/// [`MigrationBackend`] backed by the target server's REST API.
pub struct ApiBackend {
    http: HttpClient,
    config: TargetConfig,
}

impl ApiBackend {
    pub fn new(http: HttpClient, config: TargetConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!(
            "{}/api/v1{}{}apikey={}",
            self.config.base_url.trim_end_matches('/'),
            path,
            separator,
            urlencoding::encode(&self.config.api_key)
        )
    }
}

#[async_trait]
impl MigrationBackend for ApiBackend {
    #[instrument(skip(self))]
    async fn detect_source_database(&self, source_type: SourceType) -> Result<Option<PathBuf>> {
        let url = self.url(&format!("/arrimport/detect?type={}", source_type));
        let response: DetectResponse = self.http.get_json(&url).await?;

        match &response.found {
            Some(path) => info!("Found {} database at {}", source_type, path),
            None => debug!("No {} database found", source_type),
        }
        Ok(response.found.filter(|p| !p.is_empty()).map(PathBuf::from))
    }

    #[instrument(skip(self))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<()> {
        info!("Connecting to {} source", config.source_type());
        let url = self.url("/arrimport/connect");
        self.http.post(&url, Some(config)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn disconnect(&self) -> Result<()> {
        let url = self.url("/arrimport/disconnect");
        self.http.post::<()>(&url, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn source_root_folders(&self) -> Result<Vec<SourceRootFolder>> {
        let url = self.url("/arrimport/source/rootfolders");
        self.http.get_json(&url).await
    }

    #[instrument(skip(self))]
    async fn source_quality_profiles(&self) -> Result<Vec<SourceQualityProfile>> {
        let url = self.url("/arrimport/source/qualityprofiles");
        self.http.get_json(&url).await
    }

    #[instrument(skip(self))]
    async fn target_root_folders(&self, source_type: SourceType) -> Result<Vec<TargetRootFolder>> {
        let url = self.url(&format!("/rootfolders?mediaType={}", source_type.media_type()));
        self.http.get_json(&url).await
    }

    #[instrument(skip(self))]
    async fn target_quality_profiles(&self) -> Result<Vec<TargetQualityProfile>> {
        let url = self.url("/qualityprofiles");
        self.http.get_json(&url).await
    }

    #[instrument(skip(self, mappings))]
    async fn compute_preview(&self, mappings: &ImportMappings) -> Result<ImportPreview> {
        info!("Requesting import preview");
        let url = self.url("/arrimport/preview");
        let preview: ImportPreview = self.http.post_json(&url, mappings).await?;
        info!(
            "Preview: {} movies, {} series",
            preview.movies.len(),
            preview.series.len()
        );
        Ok(preview)
    }

    #[instrument(skip(self, mappings))]
    async fn execute_import(&self, mappings: &ImportMappings) -> Result<JobId> {
        let url = self.url("/arrimport/execute");
        let response: ExecuteResponse = self.http.post_json(&url, mappings).await?;
        info!("Import submitted as job {}", response.job_id);
        Ok(JobId(response.job_id))
    }

    fn observe_progress(&self, job: &JobId) -> BoxStream<'_, Result<Activity>> {
        let url = self.url(&format!("/activity/{}", urlencoding::encode(&job.0)));
        let interval = self.config.poll_interval();

        stream::unfold(true, move |first| {
            let url = url.clone();
            async move {
                if !first {
                    tokio::time::sleep(interval).await;
                }
                let snapshot = self.http.get_json::<Activity>(&url).await;
                Some((snapshot, false))
            }
        })
        .boxed()
    }
}
