use crate::backend::MigrationBackend;
use crate::config::MappingOverrides;
use crate::error::{describe, WizardError};
use crate::mapping::MappingGate;
use crate::models::{
    Activity, ConnectionConfig, ImportMappings, ImportReport, JobId, SourceType,
    TargetQualityProfile, TargetRootFolder,
};
use crate::monitor::{Completion, ImportMonitor, MonitorView};
use crate::preview::{PreviewFilter, PreviewSession};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connect,
    Mapping,
    Preview,
    Importing,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Connect => "connect",
            Step::Mapping => "mapping",
            Step::Preview => "preview",
            Step::Importing => "importing",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WizardOptions {
    pub default_filter: PreviewFilter,
    pub max_errors: usize,
}

impl Default for WizardOptions {
    fn default() -> Self {
        Self {
            default_filter: PreviewFilter::All,
            max_errors: 50,
        }
    }
}

pub struct Wizard<B> {
    backend: B,
    options: WizardOptions,
    step: Step,
    source_type: SourceType,
    connection: Option<ConnectionConfig>,
    error: Option<WizardError>,
    target_root_folders: Vec<TargetRootFolder>,
    target_profiles: Vec<TargetQualityProfile>,
    mapping: MappingGate,
    resolved: Option<ImportMappings>,
    preview: Option<PreviewSession>,
    monitor: Option<ImportMonitor>,
}

impl<B: MigrationBackend> Wizard<B> {
    pub fn new(backend: B, options: WizardOptions) -> Self {
        Self {
            backend,
            options,
            step: Step::Connect,
            source_type: SourceType::default(),
            connection: None,
            error: None,
            target_root_folders: Vec::new(),
            target_profiles: Vec::new(),
            mapping: MappingGate::new(),
            resolved: None,
            preview: None,
            monitor: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn options(&self) -> &WizardOptions {
        &self.options
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn error(&self) -> Option<&WizardError> {
        self.error.as_ref()
    }

    pub fn mapping(&self) -> &MappingGate {
        &self.mapping
    }

    pub fn target_root_folders(&self) -> &[TargetRootFolder] {
        &self.target_root_folders
    }

    pub fn target_quality_profiles(&self) -> &[TargetQualityProfile] {
        &self.target_profiles
    }

    pub fn preview(&self) -> Option<&PreviewSession> {
        self.preview.as_ref()
    }

    pub fn monitor(&self) -> Option<&ImportMonitor> {
        self.monitor.as_ref()
    }

    fn expect_step(&self, action: &'static str, step: Step) -> Result<(), WizardError> {
        if self.step != step {
            return Err(WizardError::WrongStep {
                action,
                step: self.step,
            });
        }
        Ok(())
    }

    fn fail<T>(&mut self, err: WizardError) -> Result<T, WizardError> {
        warn!("{}", err);
        self.error = Some(err.clone());
        Err(err)
    }

    // ---- connect ------------------------------------------------------

    pub fn set_source_type(&mut self, source_type: SourceType) -> Result<(), WizardError> {
        self.expect_step("Changing the source type", Step::Connect)?;
        if self.connection.is_some() {
            return Err(WizardError::WrongStep {
                action: "Changing the source type after connecting",
                step: self.step,
            });
        }
        self.source_type = source_type;
        Ok(())
    }

    /// Best effort: failures are logged and reported as "not found".
    pub async fn detect_source_database(&self) -> Option<PathBuf> {
        match self.backend.detect_source_database(self.source_type).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Database detection failed: {:#}", e);
                None
            }
        }
    }

    pub async fn connect(&mut self, config: ConnectionConfig) -> Result<(), WizardError> {
        self.expect_step("Connecting", Step::Connect)?;

        if let Err(msg) = config.validate() {
            return self.fail(WizardError::Connect(msg));
        }

        if self.connection.as_ref() == Some(&config) {
            debug!("Already connected, reloading reference lists");
        } else {
            if self.connection.is_some() {
                info!("Connection settings changed, reconnecting");
                self.close_session().await;
            }
            if let Err(e) = self.backend.connect(&config).await {
                error!("Failed to connect to {}: {:#}", config.source_type(), e);
                return self.fail(WizardError::Connect(describe(&e)));
            }
            self.source_type = config.source_type();
            info!("Connected to {} source", self.source_type);
            self.connection = Some(config);
        }

        self.load_references().await
    }

    /// Retry point when a fetch fails after a successful connect.
    pub async fn load_references(&mut self) -> Result<(), WizardError> {
        self.expect_step("Loading source configuration", Step::Connect)?;
        if self.connection.is_none() {
            return Err(WizardError::NotConnected);
        }

        let (source_folders, source_profiles, target_folders, target_profiles) = tokio::join!(
            self.backend.source_root_folders(),
            self.backend.source_quality_profiles(),
            self.backend.target_root_folders(self.source_type),
            self.backend.target_quality_profiles(),
        );

        let fetched = source_folders.and_then(|sf| {
            let sp = source_profiles?;
            let tf = target_folders?;
            let tp = target_profiles?;
            Ok((sf, sp, tf, tp))
        });
        let (source_folders, source_profiles, target_folders, target_profiles) = match fetched {
            Ok(lists) => lists,
            Err(e) => return self.fail(WizardError::ReferenceFetch(describe(&e))),
        };

        info!(
            "Loaded {} root folders and {} quality profiles from {}",
            source_folders.len(),
            source_profiles.len(),
            self.source_type
        );

        self.mapping.sync_root_folders(&source_folders, &target_folders);
        self.mapping.sync_quality_profiles(&source_profiles, &target_profiles);
        self.target_root_folders = target_folders;
        self.target_profiles = target_profiles;
        self.error = None;
        self.step = Step::Mapping;
        Ok(())
    }

    // ---- mapping ------------------------------------------------------

    pub fn set_root_folder_mapping(&mut self, path: &str, target: Option<i32>) -> Result<(), WizardError> {
        self.expect_step("Editing mappings", Step::Mapping)?;
        self.mapping.set_root_folder(path, target);
        Ok(())
    }

    pub fn set_quality_profile_mapping(&mut self, source_id: i32, target: Option<i32>) -> Result<(), WizardError> {
        self.expect_step("Editing mappings", Step::Mapping)?;
        self.mapping.set_quality_profile(source_id, target);
        Ok(())
    }

    pub fn set_profile_enabled(&mut self, source_id: i32, enabled: bool) -> Result<(), WizardError> {
        self.expect_step("Editing mappings", Step::Mapping)?;
        self.mapping.set_profile_enabled(source_id, enabled);
        Ok(())
    }

    /// Applies configured corrections by source path and profile name.
    /// Entries that match nothing in the source are logged and skipped.
    pub fn apply_overrides(&mut self, overrides: &MappingOverrides) -> Result<(), WizardError> {
        self.expect_step("Editing mappings", Step::Mapping)?;

        for (path, target) in &overrides.root_folders {
            if self.mapping.source_root_folders().iter().any(|f| f.path == *path) {
                self.mapping.set_root_folder(path, Some(*target));
            } else {
                warn!("Root folder '{}' not found in source", path);
            }
        }

        for (name, target) in &overrides.quality_profiles {
            let ids = self.profile_ids(name);
            if ids.is_empty() {
                warn!("Quality profile '{}' not found in source", name);
            }
            for id in ids {
                self.mapping.set_quality_profile(id, Some(*target));
            }
        }

        let toggles = overrides
            .enabled_profiles
            .iter()
            .map(|name| (name, true))
            .chain(overrides.disabled_profiles.iter().map(|name| (name, false)));
        for (name, enabled) in toggles {
            let ids = self.profile_ids(name);
            if ids.is_empty() {
                warn!("Quality profile '{}' not found in source", name);
            }
            for id in ids {
                self.mapping.set_profile_enabled(id, enabled);
            }
        }
        Ok(())
    }

    fn profile_ids(&self, name: &str) -> Vec<i32> {
        self.mapping
            .source_profiles()
            .iter()
            .filter(|p| p.name == name)
            .map(|p| p.id)
            .collect()
    }

    pub fn can_request_preview(&self) -> bool {
        self.step == Step::Mapping && self.mapping.is_ready()
    }

    pub async fn request_preview(&mut self) -> Result<&PreviewSession, WizardError> {
        self.expect_step("Previewing", Step::Mapping)?;
        let mappings = self.mapping.resolve()?;

        let preview = match self.backend.compute_preview(&mappings).await {
            Ok(preview) => preview,
            Err(e) => return self.fail(WizardError::Preview(describe(&e))),
        };

        let session = PreviewSession::new(self.source_type, preview, self.options.default_filter);
        info!(
            "Preview ready: {} of {} items selected",
            session.selection().len(),
            session.counts().all
        );

        self.resolved = Some(mappings);
        self.error = None;
        self.step = Step::Preview;
        Ok(self.preview.insert(session))
    }

    // ---- preview ------------------------------------------------------

    pub fn toggle_one(&mut self, id: i32) -> Result<(), WizardError> {
        self.preview_mut("Changing the selection")?.toggle_one(id);
        Ok(())
    }

    pub fn toggle_all(&mut self) -> Result<(), WizardError> {
        self.preview_mut("Changing the selection")?.toggle_all();
        Ok(())
    }

    pub fn set_filter(&mut self, filter: PreviewFilter) -> Result<(), WizardError> {
        self.preview_mut("Filtering")?.set_filter(filter);
        Ok(())
    }

    fn preview_mut(&mut self, action: &'static str) -> Result<&mut PreviewSession, WizardError> {
        self.expect_step(action, Step::Preview)?;
        let step = self.step;
        self.preview
            .as_mut()
            .ok_or(WizardError::WrongStep { action, step })
    }

    pub fn can_start_import(&self) -> bool {
        self.step == Step::Preview && self.preview.as_ref().is_some_and(|p| p.can_submit())
    }

    pub async fn start_import(&mut self) -> Result<JobId, WizardError> {
        self.expect_step("Importing", Step::Preview)?;
        let (Some(session), Some(resolved)) = (&self.preview, &self.resolved) else {
            return Err(WizardError::WrongStep {
                action: "Importing",
                step: self.step,
            });
        };
        let submission = session.submission(resolved.clone())?;

        let job = match self.backend.execute_import(&submission).await {
            Ok(job) => job,
            Err(e) => return self.fail(WizardError::Import(describe(&e))),
        };

        info!("Import job {} started", job);
        // The selection has been handed over.
        self.preview = None;
        self.monitor = Some(ImportMonitor::new(job.clone()));
        self.error = None;
        self.step = Step::Importing;
        Ok(job)
    }

    // ---- importing ----------------------------------------------------

    /// Feeds one pushed activity snapshot. Returns true if it finished the job.
    pub fn observe_activity(&mut self, activity: Activity) -> bool {
        match self.monitor.as_mut() {
            Some(monitor) => monitor.observe(activity),
            None => false,
        }
    }

    /// `None` means the feed ended first; calling again re-subscribes.
    pub async fn watch_import<F>(&mut self, on_update: F) -> Result<Option<Completion>, WizardError>
    where
        F: FnMut(&MonitorView),
    {
        self.expect_step("Watching the import", Step::Importing)?;
        let Some(monitor) = self.monitor.as_mut() else {
            return Err(WizardError::WrongStep {
                action: "Watching the import",
                step: self.step,
            });
        };

        let job = monitor.job().clone();
        let updates = self.backend.observe_progress(&job);
        Ok(monitor.watch(updates, on_update).await)
    }

    pub fn view(&self) -> Option<MonitorView> {
        self.monitor.as_ref().map(|m| m.view())
    }

    pub fn completion(&self) -> Option<Completion> {
        self.monitor.as_ref().and_then(|m| m.completion())
    }

    pub fn is_finished(&self) -> bool {
        self.monitor.as_ref().is_some_and(|m| m.is_finished())
    }

    /// Only available once the import has finished.
    pub async fn handle_done(&mut self) -> Result<Option<ImportReport>, WizardError> {
        if !self.is_finished() {
            return Err(WizardError::WrongStep {
                action: "Finishing",
                step: self.step,
            });
        }

        let report = self
            .completion()
            .and_then(|c| c.outcome.report().cloned());
        self.teardown().await;
        Ok(report)
    }

    /// A submitted job keeps running on the server.
    pub async fn abandon(&mut self) {
        if let Some(monitor) = &self.monitor {
            if !monitor.is_finished() {
                info!("Leaving import job {} running in the background", monitor.job());
            }
        }
        self.teardown().await;
    }

    async fn close_session(&mut self) {
        if self.connection.take().is_some() {
            if let Err(e) = self.backend.disconnect().await {
                warn!("Failed to disconnect from source: {:#}", e);
            }
        }
    }

    async fn teardown(&mut self) {
        self.close_session().await;

        self.step = Step::Connect;
        self.source_type = SourceType::default();
        self.error = None;
        self.target_root_folders.clear();
        self.target_profiles.clear();
        self.mapping = MappingGate::new();
        self.resolved = None;
        self.preview = None;
        self.monitor = None;
        debug!("Wizard reset");
    }
}
