use anyhow::{anyhow, Result};
use arrmigrate::backend::MigrationBackend;
use arrmigrate::config::MappingOverrides;
use arrmigrate::models::{
    Activity, ActivityMetadata, ActivityStatus, ConnectionConfig, ImportMappings, ImportPreview,
    ImportReport, JobId, MoviePreview, PreviewStatus, SeriesPreview, SourceQualityProfile,
    SourceRootFolder, SourceType, TargetQualityProfile, TargetRootFolder,
};
use arrmigrate::monitor::{ImportOutcome, MonitorView};
use arrmigrate::preview::PreviewFilter;
use arrmigrate::{Step, Wizard, WizardError, WizardOptions};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// =============================================================================
// Scripted backend
// =============================================================================

struct Script {
    calls: Vec<&'static str>,
    detect: Result<Option<PathBuf>, String>,
    connect: Result<(), String>,
    disconnect: Result<(), String>,
    source_folders: Result<Vec<SourceRootFolder>, String>,
    source_profiles: Result<Vec<SourceQualityProfile>, String>,
    target_folders: Result<Vec<TargetRootFolder>, String>,
    target_profiles: Result<Vec<TargetQualityProfile>, String>,
    preview: Result<ImportPreview, String>,
    execute: Result<String, String>,
    activities: Vec<Activity>,
    preview_requests: Vec<ImportMappings>,
    import_requests: Vec<ImportMappings>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            detect: Ok(None),
            connect: Ok(()),
            disconnect: Ok(()),
            source_folders: Ok(vec![SourceRootFolder {
                id: 1,
                path: "/movies".to_string(),
            }]),
            source_profiles: Ok(vec![
                SourceQualityProfile {
                    id: 1,
                    name: "HD-1080p".to_string(),
                    in_use: true,
                },
                SourceQualityProfile {
                    id: 2,
                    name: "Ultra-HD".to_string(),
                    in_use: false,
                },
            ]),
            target_folders: Ok(vec![TargetRootFolder {
                id: 4,
                path: "/movies".to_string(),
            }]),
            target_profiles: Ok(vec![
                TargetQualityProfile {
                    id: 9,
                    name: "HD-1080p".to_string(),
                },
                TargetQualityProfile {
                    id: 12,
                    name: "Ultra-HD".to_string(),
                },
            ]),
            preview: Ok(ImportPreview {
                movies: vec![
                    movie(1, PreviewStatus::New),
                    movie(2, PreviewStatus::Duplicate),
                    movie(3, PreviewStatus::New),
                    movie(4, PreviewStatus::Skip),
                ],
                ..Default::default()
            }),
            execute: Ok("job-1".to_string()),
            activities: Vec::new(),
            preview_requests: Vec::new(),
            import_requests: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
struct FakeBackend {
    script: Arc<Mutex<Script>>,
}

impl FakeBackend {
    fn edit(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    fn calls(&self) -> Vec<&'static str> {
        self.script.lock().unwrap().calls.clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn preview_requests(&self) -> Vec<ImportMappings> {
        self.script.lock().unwrap().preview_requests.clone()
    }

    fn import_requests(&self) -> Vec<ImportMappings> {
        self.script.lock().unwrap().import_requests.clone()
    }

    fn record(&self, call: &'static str) {
        self.script.lock().unwrap().calls.push(call);
    }
}

fn scripted<T: Clone>(result: &Result<T, String>) -> Result<T> {
    result.clone().map_err(|e| anyhow!(e))
}

#[async_trait]
impl MigrationBackend for FakeBackend {
    async fn detect_source_database(&self, _source_type: SourceType) -> Result<Option<PathBuf>> {
        self.record("detect");
        scripted(&self.script.lock().unwrap().detect)
    }

    async fn connect(&self, _config: &ConnectionConfig) -> Result<()> {
        self.record("connect");
        scripted(&self.script.lock().unwrap().connect)
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect");
        scripted(&self.script.lock().unwrap().disconnect)
    }

    async fn source_root_folders(&self) -> Result<Vec<SourceRootFolder>> {
        self.record("source_root_folders");
        scripted(&self.script.lock().unwrap().source_folders)
    }

    async fn source_quality_profiles(&self) -> Result<Vec<SourceQualityProfile>> {
        self.record("source_quality_profiles");
        scripted(&self.script.lock().unwrap().source_profiles)
    }

    async fn target_root_folders(&self, _source_type: SourceType) -> Result<Vec<TargetRootFolder>> {
        self.record("target_root_folders");
        scripted(&self.script.lock().unwrap().target_folders)
    }

    async fn target_quality_profiles(&self) -> Result<Vec<TargetQualityProfile>> {
        self.record("target_quality_profiles");
        scripted(&self.script.lock().unwrap().target_profiles)
    }

    async fn compute_preview(&self, mappings: &ImportMappings) -> Result<ImportPreview> {
        self.record("compute_preview");
        let mut script = self.script.lock().unwrap();
        script.preview_requests.push(mappings.clone());
        scripted(&script.preview)
    }

    async fn execute_import(&self, mappings: &ImportMappings) -> Result<JobId> {
        self.record("execute_import");
        let mut script = self.script.lock().unwrap();
        script.import_requests.push(mappings.clone());
        scripted(&script.execute).map(JobId)
    }

    fn observe_progress(&self, _job: &JobId) -> BoxStream<'_, Result<Activity>> {
        self.record("observe_progress");
        let activities = self.script.lock().unwrap().activities.clone();
        stream::iter(activities.into_iter().map(Ok)).boxed()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn movie(tmdb_id: i32, status: PreviewStatus) -> MoviePreview {
    MoviePreview {
        tmdb_id,
        title: format!("Movie {}", tmdb_id),
        year: Some(1990 + tmdb_id),
        status,
        skip_reason: None,
    }
}

fn api_config(source_type: SourceType) -> ConnectionConfig {
    ConnectionConfig::Api {
        source_type,
        url: "http://radarr:7878".to_string(),
        api_key: "source-key".to_string(),
    }
}

fn activity(status: ActivityStatus, report: Option<ImportReport>) -> Activity {
    Activity {
        id: "job-1".to_string(),
        title: Some("Importing library".to_string()),
        subtitle: None,
        status,
        progress: None,
        started_at: None,
        completed_at: None,
        metadata: report.map(|r| ActivityMetadata { report: Some(r) }),
    }
}

fn wizard(backend: &FakeBackend) -> Wizard<FakeBackend> {
    Wizard::new(backend.clone(), WizardOptions::default())
}

async fn at_mapping(backend: &FakeBackend) -> Wizard<FakeBackend> {
    let mut w = wizard(backend);
    w.connect(api_config(SourceType::Radarr)).await.unwrap();
    w
}

async fn at_preview(backend: &FakeBackend) -> Wizard<FakeBackend> {
    let mut w = at_mapping(backend).await;
    w.request_preview().await.unwrap();
    w
}

async fn at_importing(backend: &FakeBackend) -> Wizard<FakeBackend> {
    let mut w = at_preview(backend).await;
    w.start_import().await.unwrap();
    w
}

// =============================================================================
// Connect step
// =============================================================================

mod connect {
    use super::*;

    #[tokio::test]
    async fn test_starts_on_connect_step() {
        let backend = FakeBackend::default();
        let w = wizard(&backend);
        assert_eq!(w.step(), Step::Connect);
        assert!(!w.is_connected());
        assert!(w.error().is_none());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_successful_connect_loads_references_and_auto_matches() {
        let backend = FakeBackend::default();
        let w = at_mapping(&backend).await;

        assert_eq!(w.step(), Step::Mapping);
        assert!(w.is_connected());
        assert_eq!(w.mapping().quality_profile_target(1), Some(9));
        assert_eq!(w.mapping().root_folder_target("/movies"), Some(4));
        assert!(w.mapping().is_profile_enabled(1));
        assert!(!w.mapping().is_profile_enabled(2));
        assert_eq!(w.target_quality_profiles().len(), 2);

        for call in [
            "source_root_folders",
            "source_quality_profiles",
            "target_root_folders",
            "target_quality_profiles",
        ] {
            assert_eq!(backend.count(call), 1, "{} should be fetched once", call);
        }
    }

    #[tokio::test]
    async fn test_connect_adopts_source_type_of_config() {
        let backend = FakeBackend::default();
        let mut w = wizard(&backend);
        w.connect(api_config(SourceType::Sonarr)).await.unwrap();
        assert_eq!(w.source_type(), SourceType::Sonarr);
    }

    #[tokio::test]
    async fn test_failed_connect_surfaces_message_verbatim() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.connect = Err("Invalid API key".to_string()));
        let mut w = wizard(&backend);

        let err = w.connect(api_config(SourceType::Radarr)).await.unwrap_err();
        assert_eq!(err, WizardError::Connect("Invalid API key".to_string()));
        assert_eq!(err.to_string(), "Invalid API key");
        assert_eq!(w.error(), Some(&err));
        assert_eq!(w.step(), Step::Connect);
        assert!(!w.is_connected());
        assert_eq!(backend.count("source_root_folders"), 0);

        backend.edit(|s| s.connect = Ok(()));
        w.connect(api_config(SourceType::Radarr)).await.unwrap();
        assert_eq!(w.step(), Step::Mapping);
        assert!(w.error().is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_without_round_trip() {
        let backend = FakeBackend::default();
        let mut w = wizard(&backend);

        let err = w
            .connect(ConnectionConfig::Sqlite {
                source_type: SourceType::Radarr,
                db_path: PathBuf::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::Connect(_)));
        assert_eq!(backend.count("connect"), 0);
        assert_eq!(w.step(), Step::Connect);
    }

    #[tokio::test]
    async fn test_reference_fetch_failure_does_not_advance() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.source_profiles = Err("no such table: QualityProfiles".to_string()));
        let mut w = wizard(&backend);

        let err = w.connect(api_config(SourceType::Radarr)).await.unwrap_err();
        assert_eq!(
            err,
            WizardError::ReferenceFetch("no such table: QualityProfiles".to_string())
        );
        assert_eq!(w.step(), Step::Connect);
        assert!(w.is_connected());
        assert!(w.mapping().source_root_folders().is_empty());

        backend.edit(|s| s.source_profiles = Ok(Vec::new()));
        w.load_references().await.unwrap();
        assert_eq!(w.step(), Step::Mapping);
        assert_eq!(backend.count("connect"), 1);
        assert_eq!(backend.count("source_root_folders"), 2);
    }

    #[tokio::test]
    async fn test_retry_with_same_config_reuses_session() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.source_profiles = Err("database is locked".to_string()));
        let mut w = wizard(&backend);
        w.connect(api_config(SourceType::Radarr)).await.unwrap_err();

        backend.edit(|s| s.source_profiles = Ok(Vec::new()));
        w.connect(api_config(SourceType::Radarr)).await.unwrap();
        assert_eq!(w.step(), Step::Mapping);
        assert_eq!(backend.count("connect"), 1);
        assert_eq!(backend.count("disconnect"), 0);
    }

    #[tokio::test]
    async fn test_retry_with_changed_config_reconnects() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.source_profiles = Err("no such table: QualityProfiles".to_string()));
        let mut w = wizard(&backend);
        w.connect(api_config(SourceType::Radarr)).await.unwrap_err();
        assert!(w.is_connected());

        backend.edit(|s| s.source_profiles = Ok(Vec::new()));
        w.connect(api_config(SourceType::Sonarr)).await.unwrap();

        assert_eq!(w.step(), Step::Mapping);
        assert_eq!(w.source_type(), SourceType::Sonarr);
        assert_eq!(backend.count("connect"), 2);
        assert_eq!(backend.count("disconnect"), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_leaves_no_session() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.source_folders = Err("timeout".to_string()));
        let mut w = wizard(&backend);
        w.connect(api_config(SourceType::Radarr)).await.unwrap_err();

        backend.edit(|s| s.connect = Err("file is not a database".to_string()));
        let err = w
            .connect(ConnectionConfig::Sqlite {
                source_type: SourceType::Radarr,
                db_path: PathBuf::from("/config/notes.txt"),
            })
            .await
            .unwrap_err();

        assert_eq!(err, WizardError::Connect("file is not a database".to_string()));
        assert!(!w.is_connected());
        assert_eq!(backend.count("disconnect"), 1);
        assert_eq!(w.load_references().await, Err(WizardError::NotConnected));
    }

    #[tokio::test]
    async fn test_target_fetch_failure_does_not_advance() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.target_folders = Err("timeout".to_string()));
        let mut w = wizard(&backend);

        let err = w.connect(api_config(SourceType::Radarr)).await.unwrap_err();
        assert!(matches!(err, WizardError::ReferenceFetch(_)));
        assert_eq!(w.step(), Step::Connect);
    }

    #[tokio::test]
    async fn test_load_references_requires_session() {
        let backend = FakeBackend::default();
        let mut w = wizard(&backend);
        assert_eq!(w.load_references().await, Err(WizardError::NotConnected));
    }

    #[tokio::test]
    async fn test_source_type_is_locked_after_connect() {
        let backend = FakeBackend::default();
        let mut w = wizard(&backend);
        w.set_source_type(SourceType::Sonarr).unwrap();
        w.set_source_type(SourceType::Radarr).unwrap();
        assert_eq!(w.source_type(), SourceType::Radarr);

        w.connect(api_config(SourceType::Radarr)).await.unwrap();
        assert!(w.set_source_type(SourceType::Sonarr).is_err());
        assert_eq!(w.source_type(), SourceType::Radarr);
    }

    #[tokio::test]
    async fn test_detection_is_best_effort() {
        let backend = FakeBackend::default();
        let w = wizard(&backend);

        backend.edit(|s| s.detect = Ok(Some(PathBuf::from("/config/radarr.db"))));
        assert_eq!(
            w.detect_source_database().await,
            Some(PathBuf::from("/config/radarr.db"))
        );

        backend.edit(|s| s.detect = Err("permission denied".to_string()));
        assert_eq!(w.detect_source_database().await, None);
        assert!(w.error().is_none());
    }
}

// =============================================================================
// Mapping step
// =============================================================================

mod mapping {
    use super::*;

    #[tokio::test]
    async fn test_overrides_apply_by_path_and_name() {
        let backend = FakeBackend::default();
        let mut w = at_mapping(&backend).await;

        let mut overrides = MappingOverrides::default();
        overrides.root_folders.insert("/movies".to_string(), 5);
        overrides.quality_profiles.insert("Ultra-HD".to_string(), 9);
        overrides.enabled_profiles.push("Ultra-HD".to_string());
        overrides.disabled_profiles.push("HD-1080p".to_string());
        w.apply_overrides(&overrides).unwrap();

        assert_eq!(w.mapping().root_folder_target("/movies"), Some(5));
        assert_eq!(w.mapping().quality_profile_target(2), Some(9));
        assert!(w.mapping().is_profile_enabled(2));
        assert!(!w.mapping().is_profile_enabled(1));
    }

    #[tokio::test]
    async fn test_override_for_unknown_root_folder_is_skipped() {
        let backend = FakeBackend::default();
        let mut w = at_mapping(&backend).await;

        let mut overrides = MappingOverrides::default();
        overrides.root_folders.insert("/moveis".to_string(), 5);
        w.apply_overrides(&overrides).unwrap();

        assert_eq!(w.mapping().root_folder_target("/moveis"), None);
        assert_eq!(w.mapping().root_folder_target("/movies"), Some(4));

        w.request_preview().await.unwrap();
        let sent = &backend.preview_requests()[0];
        assert_eq!(sent.root_folder_mapping.len(), 1);
        assert!(!sent.root_folder_mapping.contains_key("/moveis"));
    }

    #[tokio::test]
    async fn test_overrides_require_mapping_step() {
        let backend = FakeBackend::default();
        let mut w = wizard(&backend);
        let err = w.apply_overrides(&MappingOverrides::default()).unwrap_err();
        assert!(matches!(err, WizardError::WrongStep { .. }));
    }

    #[tokio::test]
    async fn test_preview_blocked_until_everything_is_mapped() {
        let backend = FakeBackend::default();
        backend.edit(|s| {
            s.target_folders = Ok(vec![TargetRootFolder {
                id: 4,
                path: "/media/films".to_string(),
            }])
        });
        let mut w = at_mapping(&backend).await;

        assert!(!w.mapping().all_root_folders_mapped());
        assert!(!w.can_request_preview());
        assert_eq!(
            w.request_preview().await.unwrap_err(),
            WizardError::MappingIncomplete
        );
        assert_eq!(backend.count("compute_preview"), 0);
        assert_eq!(w.step(), Step::Mapping);

        w.set_root_folder_mapping("/movies", Some(4)).unwrap();
        assert!(w.can_request_preview());
        w.request_preview().await.unwrap();
        assert_eq!(w.step(), Step::Preview);
    }

    #[tokio::test]
    async fn test_enabled_profile_needs_a_target() {
        let backend = FakeBackend::default();
        let mut w = at_mapping(&backend).await;

        w.set_quality_profile_mapping(2, None).unwrap();
        w.set_profile_enabled(2, true).unwrap();
        assert!(!w.can_request_preview());

        w.set_profile_enabled(2, false).unwrap();
        assert!(w.can_request_preview());
    }

    #[tokio::test]
    async fn test_disabled_profile_is_excluded_from_submitted_mappings() {
        let backend = FakeBackend::default();
        let mut w = at_mapping(&backend).await;

        // Auto-matched but disabled because it is not in use.
        assert_eq!(w.mapping().quality_profile_target(2), Some(12));
        w.request_preview().await.unwrap();

        let sent = &backend.preview_requests()[0];
        assert_eq!(sent.quality_profile_mapping.get(&1), Some(&9));
        assert!(!sent.quality_profile_mapping.contains_key(&2));
        assert_eq!(w.mapping().quality_profile_target(2), Some(12));

        w.start_import().await.unwrap();
        let submitted = &backend.import_requests()[0];
        assert!(!submitted.quality_profile_mapping.contains_key(&2));
    }

    #[tokio::test]
    async fn test_preview_failure_keeps_mapping_state() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.preview = Err("source database is locked".to_string()));
        let mut w = at_mapping(&backend).await;
        w.set_quality_profile_mapping(1, Some(12)).unwrap();

        let err = w.request_preview().await.unwrap_err();
        assert_eq!(
            err,
            WizardError::Preview("source database is locked".to_string())
        );
        assert_eq!(w.step(), Step::Mapping);
        assert_eq!(w.mapping().quality_profile_target(1), Some(12));

        backend.edit(|s| {
            s.preview = Ok(ImportPreview {
                movies: vec![movie(1, PreviewStatus::New)],
                ..Default::default()
            })
        });
        w.request_preview().await.unwrap();
        assert_eq!(w.step(), Step::Preview);
        assert_eq!(backend.count("compute_preview"), 2);
        assert_eq!(
            backend.preview_requests()[1].quality_profile_mapping.get(&1),
            Some(&12)
        );
    }

    #[tokio::test]
    async fn test_mapping_edits_rejected_outside_mapping_step() {
        let backend = FakeBackend::default();
        let mut w = wizard(&backend);
        assert!(matches!(
            w.set_root_folder_mapping("/movies", Some(4)),
            Err(WizardError::WrongStep { step: Step::Connect, .. })
        ));
    }
}

// =============================================================================
// Preview step
// =============================================================================

mod preview {
    use super::*;

    #[tokio::test]
    async fn test_default_selection_is_all_new_items() {
        let backend = FakeBackend::default();
        let w = at_preview(&backend).await;

        let session = w.preview().unwrap();
        assert_eq!(session.selection().ids(), vec![1, 3]);
        assert_eq!(session.counts().all, 4);
    }

    #[tokio::test]
    async fn test_toggle_all_scenario() {
        let backend = FakeBackend::default();
        backend.edit(|s| {
            s.preview = Ok(ImportPreview {
                movies: vec![movie(1, PreviewStatus::New), movie(2, PreviewStatus::Duplicate)],
                ..Default::default()
            })
        });
        let mut w = at_preview(&backend).await;
        assert_eq!(w.preview().unwrap().selection().ids(), vec![1]);

        w.toggle_all().unwrap();
        assert!(w.preview().unwrap().selection().is_empty());

        w.toggle_all().unwrap();
        assert_eq!(w.preview().unwrap().selection().ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_filter_is_display_only() {
        let backend = FakeBackend::default();
        let mut w = at_preview(&backend).await;
        w.toggle_one(3).unwrap();

        w.set_filter(PreviewFilter::Skip).unwrap();
        let rows = w.preview().unwrap().visible_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 4);
        assert_eq!(w.preview().unwrap().selection().ids(), vec![1]);
        assert_eq!(backend.count("compute_preview"), 1);
    }

    #[tokio::test]
    async fn test_injected_default_filter() {
        let backend = FakeBackend::default();
        let mut w = Wizard::new(
            backend.clone(),
            WizardOptions {
                default_filter: PreviewFilter::New,
                max_errors: 10,
            },
        );
        w.connect(api_config(SourceType::Radarr)).await.unwrap();
        let session = w.request_preview().await.unwrap();
        assert_eq!(session.filter(), PreviewFilter::New);
        assert_eq!(session.visible_rows().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_selection_never_reaches_the_server() {
        let backend = FakeBackend::default();
        let mut w = at_preview(&backend).await;
        w.toggle_all().unwrap();

        assert!(!w.can_start_import());
        assert_eq!(w.start_import().await, Err(WizardError::EmptySelection));
        assert_eq!(backend.count("execute_import"), 0);
        assert_eq!(w.step(), Step::Preview);
    }

    #[tokio::test]
    async fn test_movie_import_sends_tmdb_ids_only() {
        let backend = FakeBackend::default();
        let mut w = at_preview(&backend).await;
        w.toggle_one(1).unwrap();

        let job = w.start_import().await.unwrap();
        assert_eq!(job, JobId("job-1".to_string()));
        assert_eq!(w.step(), Step::Importing);
        assert!(w.preview().is_none());

        let submitted = &backend.import_requests()[0];
        assert_eq!(submitted.selected_movie_tmdb_ids, Some(vec![3]));
        assert_eq!(submitted.selected_series_tvdb_ids, None);
        assert_eq!(submitted.root_folder_mapping.get("/movies"), Some(&4));
    }

    #[tokio::test]
    async fn test_series_import_sends_tvdb_ids_only() {
        let backend = FakeBackend::default();
        backend.edit(|s| {
            s.preview = Ok(ImportPreview {
                series: vec![
                    SeriesPreview {
                        tvdb_id: 81189,
                        title: "Breaking Bad".to_string(),
                        year: Some(2008),
                        status: PreviewStatus::New,
                        skip_reason: None,
                    },
                    SeriesPreview {
                        tvdb_id: 121361,
                        title: "Game of Thrones".to_string(),
                        year: Some(2011),
                        status: PreviewStatus::Duplicate,
                        skip_reason: None,
                    },
                ],
                ..Default::default()
            })
        });
        let mut w = wizard(&backend);
        w.connect(api_config(SourceType::Sonarr)).await.unwrap();
        w.request_preview().await.unwrap();
        w.start_import().await.unwrap();

        let submitted = &backend.import_requests()[0];
        assert_eq!(submitted.selected_series_tvdb_ids, Some(vec![81189]));
        assert_eq!(submitted.selected_movie_tmdb_ids, None);
    }

    #[tokio::test]
    async fn test_import_submission_failure_is_retryable() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.execute = Err("an import is already running".to_string()));
        let mut w = at_preview(&backend).await;
        w.toggle_one(3).unwrap();

        let err = w.start_import().await.unwrap_err();
        assert_eq!(
            err,
            WizardError::Import("an import is already running".to_string())
        );
        assert_eq!(w.step(), Step::Preview);
        assert_eq!(w.preview().unwrap().selection().ids(), vec![1]);

        backend.edit(|s| s.execute = Ok("job-2".to_string()));
        assert_eq!(w.start_import().await.unwrap(), JobId("job-2".to_string()));
    }
}

// =============================================================================
// Importing step
// =============================================================================

mod importing {
    use super::*;

    fn clean_report() -> ImportReport {
        ImportReport {
            movies_created: 2,
            files_imported: 2,
            files_total: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_watch_import_stops_at_terminal_status() {
        let backend = FakeBackend::default();
        backend.edit(|s| {
            s.activities = vec![
                activity(ActivityStatus::Pending, None),
                activity(ActivityStatus::InProgress, None),
                activity(ActivityStatus::Completed, Some(clean_report())),
                activity(ActivityStatus::InProgress, None),
            ]
        });
        let mut w = at_importing(&backend).await;

        let mut seen = 0;
        let completion = w.watch_import(|_| seen += 1).await.unwrap().unwrap();
        assert_eq!(seen, 3);
        assert_eq!(completion.status, ActivityStatus::Completed);
        assert_eq!(completion.outcome, ImportOutcome::Success(clean_report()));
        assert!(w.is_finished());
    }

    #[tokio::test]
    async fn test_completed_outcome_survives_late_updates() {
        let backend = FakeBackend::default();
        let mut w = at_importing(&backend).await;

        assert!(!w.observe_activity(activity(ActivityStatus::InProgress, None)));
        assert!(w.observe_activity(activity(ActivityStatus::Completed, None)));
        let shown = w.view();

        assert!(!w.observe_activity(activity(ActivityStatus::InProgress, None)));
        assert_eq!(w.view(), shown);
        assert!(matches!(
            w.view(),
            Some(MonitorView::Finished(ref c)) if c.outcome == ImportOutcome::Complete
        ));
    }

    #[tokio::test]
    async fn test_failed_job_is_a_valid_outcome() {
        let backend = FakeBackend::default();
        let mut w = at_importing(&backend).await;

        let report = ImportReport {
            movies_created: 1,
            movies_errored: 1,
            errors: vec!["Movie 3: destination not writable".to_string()],
            ..Default::default()
        };
        w.observe_activity(activity(ActivityStatus::Failed, Some(report.clone())));

        let completion = w.completion().unwrap();
        assert_eq!(completion.status, ActivityStatus::Failed);
        assert_eq!(completion.outcome, ImportOutcome::PartialFailure(report));
        assert!(w.error().is_none());
    }

    #[tokio::test]
    async fn test_feed_ending_early_can_be_resubscribed() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.activities = vec![activity(ActivityStatus::InProgress, None)]);
        let mut w = at_importing(&backend).await;

        assert_eq!(w.watch_import(|_| {}).await.unwrap(), None);
        assert!(!w.is_finished());

        backend.edit(|s| s.activities = vec![activity(ActivityStatus::Cancelled, None)]);
        let completion = w.watch_import(|_| {}).await.unwrap().unwrap();
        assert_eq!(completion.status, ActivityStatus::Cancelled);
        assert_eq!(backend.count("observe_progress"), 2);
    }

    #[tokio::test]
    async fn test_handle_done_only_after_terminal_status() {
        let backend = FakeBackend::default();
        let mut w = at_importing(&backend).await;

        assert!(w.handle_done().await.is_err());
        assert_eq!(w.step(), Step::Importing);
        assert_eq!(backend.count("disconnect"), 0);
    }

    #[tokio::test]
    async fn test_handle_done_disconnects_and_resets() {
        let backend = FakeBackend::default();
        let mut w = at_importing(&backend).await;
        w.observe_activity(activity(ActivityStatus::Completed, Some(clean_report())));

        let report = w.handle_done().await.unwrap();
        assert_eq!(report, Some(clean_report()));
        assert_eq!(backend.count("disconnect"), 1);

        assert_eq!(w.step(), Step::Connect);
        assert!(!w.is_connected());
        assert!(w.preview().is_none());
        assert!(w.monitor().is_none());
        assert!(w.mapping().source_root_folders().is_empty());
        assert!(w.target_root_folders().is_empty());
    }

    #[tokio::test]
    async fn test_handle_done_resets_even_if_disconnect_fails() {
        let backend = FakeBackend::default();
        backend.edit(|s| s.disconnect = Err("session already closed".to_string()));
        let mut w = at_importing(&backend).await;
        w.observe_activity(activity(ActivityStatus::Completed, None));

        assert_eq!(w.handle_done().await.unwrap(), None);
        assert_eq!(w.step(), Step::Connect);
        assert!(w.error().is_none());

        // A fresh run starts cleanly.
        w.connect(api_config(SourceType::Radarr)).await.unwrap();
        assert_eq!(w.step(), Step::Mapping);
    }

    #[tokio::test]
    async fn test_abandon_from_mapping_releases_session() {
        let backend = FakeBackend::default();
        let mut w = at_mapping(&backend).await;
        w.abandon().await;

        assert_eq!(w.step(), Step::Connect);
        assert!(!w.is_connected());
        assert_eq!(backend.count("disconnect"), 1);
    }

    #[tokio::test]
    async fn test_abandon_before_connect_skips_disconnect() {
        let backend = FakeBackend::default();
        let mut w = wizard(&backend);
        w.abandon().await;
        assert_eq!(backend.count("disconnect"), 0);
    }
}
