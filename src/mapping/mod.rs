use crate::error::WizardError;
use crate::matcher::auto_match;
use crate::models::{
    ImportMappings, SourceQualityProfile, SourceRootFolder, TargetQualityProfile, TargetRootFolder,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Auto-matching only re-runs when the list contents differ from the last
/// arrival, so a repeated delivery keeps manual edits intact.
#[derive(Debug, Clone, Default)]
pub struct MappingGate {
    source_root_folders: Vec<SourceRootFolder>,
    source_profiles: Vec<SourceQualityProfile>,
    root_folders: BTreeMap<String, i32>,
    quality_profiles: BTreeMap<i32, i32>,
    enabled: BTreeMap<i32, bool>,
    last_root_input: Option<(Vec<SourceRootFolder>, Vec<TargetRootFolder>)>,
    last_profile_input: Option<(Vec<SourceQualityProfile>, Vec<TargetQualityProfile>)>,
}

impl MappingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the lists changed and the mapping was re-seeded.
    pub fn sync_root_folders(
        &mut self,
        source: &[SourceRootFolder],
        target: &[TargetRootFolder],
    ) -> bool {
        if let Some((last_source, last_target)) = &self.last_root_input {
            if last_source.as_slice() == source && last_target.as_slice() == target {
                debug!("Root folder lists unchanged, keeping current mapping");
                return false;
            }
        }

        self.root_folders = auto_match(source, target);
        self.source_root_folders = source.to_vec();
        self.last_root_input = Some((source.to_vec(), target.to_vec()));

        info!(
            "Auto-matched {} of {} root folders",
            self.root_folders.len(),
            source.len()
        );
        true
    }

    /// Returns true when the lists changed and the mapping was re-seeded.
    /// Enablement is reset to each profile's `in_use` flag.
    pub fn sync_quality_profiles(
        &mut self,
        source: &[SourceQualityProfile],
        target: &[TargetQualityProfile],
    ) -> bool {
        if let Some((last_source, last_target)) = &self.last_profile_input {
            if last_source.as_slice() == source && last_target.as_slice() == target {
                debug!("Quality profile lists unchanged, keeping current mapping");
                return false;
            }
        }

        self.quality_profiles = auto_match(source, target);
        self.enabled = source.iter().map(|p| (p.id, p.in_use)).collect();
        self.source_profiles = source.to_vec();
        self.last_profile_input = Some((source.to_vec(), target.to_vec()));

        info!(
            "Auto-matched {} of {} quality profiles",
            self.quality_profiles.len(),
            source.len()
        );
        true
    }

    pub fn source_root_folders(&self) -> &[SourceRootFolder] {
        &self.source_root_folders
    }

    pub fn source_profiles(&self) -> &[SourceQualityProfile] {
        &self.source_profiles
    }

    pub fn root_folder_target(&self, path: &str) -> Option<i32> {
        self.root_folders.get(path).copied()
    }

    pub fn quality_profile_target(&self, source_id: i32) -> Option<i32> {
        self.quality_profiles.get(&source_id).copied()
    }

    /// Sets or clears the target of a source root folder.
    pub fn set_root_folder(&mut self, path: &str, target: Option<i32>) {
        match target {
            Some(id) => {
                self.root_folders.insert(path.to_string(), id);
            }
            None => {
                self.root_folders.remove(path);
            }
        }
    }

    /// Sets or clears the target of a source quality profile.
    pub fn set_quality_profile(&mut self, source_id: i32, target: Option<i32>) {
        match target {
            Some(id) => {
                self.quality_profiles.insert(source_id, id);
            }
            None => {
                self.quality_profiles.remove(&source_id);
            }
        }
    }

    /// Disabling keeps the stored target, so re-enabling restores it.
    pub fn set_profile_enabled(&mut self, source_id: i32, enabled: bool) {
        self.enabled.insert(source_id, enabled);
    }

    pub fn is_profile_enabled(&self, source_id: i32) -> bool {
        self.enabled.get(&source_id).copied().unwrap_or(false)
    }

    pub fn all_root_folders_mapped(&self) -> bool {
        self.source_root_folders
            .iter()
            .all(|f| self.root_folders.contains_key(&f.path))
    }

    pub fn all_profiles_mapped(&self) -> bool {
        self.source_profiles
            .iter()
            .all(|p| !self.is_profile_enabled(p.id) || self.quality_profiles.contains_key(&p.id))
    }

    pub fn is_ready(&self) -> bool {
        self.all_root_folders_mapped() && self.all_profiles_mapped()
    }

    pub fn unmapped_root_folders(&self) -> Vec<&SourceRootFolder> {
        self.source_root_folders
            .iter()
            .filter(|f| !self.root_folders.contains_key(&f.path))
            .collect()
    }

    /// Enabled profiles that still lack a target.
    pub fn unmapped_profiles(&self) -> Vec<&SourceQualityProfile> {
        self.source_profiles
            .iter()
            .filter(|p| self.is_profile_enabled(p.id) && !self.quality_profiles.contains_key(&p.id))
            .collect()
    }

    /// Builds the mappings handed to the preview. Entries for disabled
    /// profiles are left out even if they have a target.
    pub fn resolve(&self) -> Result<ImportMappings, WizardError> {
        if !self.is_ready() {
            return Err(WizardError::MappingIncomplete);
        }

        let quality_profile_mapping = self
            .quality_profiles
            .iter()
            .filter(|(source_id, _)| self.is_profile_enabled(**source_id))
            .map(|(source_id, target_id)| (*source_id, *target_id))
            .collect();

        Ok(ImportMappings {
            root_folder_mapping: self.root_folders.clone(),
            quality_profile_mapping,
            selected_movie_tmdb_ids: None,
            selected_series_tvdb_ids: None,
        })
    }
}
