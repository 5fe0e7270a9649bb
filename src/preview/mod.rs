use crate::error::WizardError;
use crate::models::{ImportMappings, ImportPreview, MoviePreview, PreviewStatus, SeriesPreview, SourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Common view over movie and series preview rows.
pub trait PreviewItem {
    /// TMDB id for movies, TVDB id for series.
    fn natural_id(&self) -> i32;
    fn status(&self) -> PreviewStatus;
    fn title(&self) -> &str;
    fn year(&self) -> Option<i32>;
    fn skip_reason(&self) -> Option<&str>;
}

impl PreviewItem for MoviePreview {
    fn natural_id(&self) -> i32 {
        self.tmdb_id
    }

    fn status(&self) -> PreviewStatus {
        self.status
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn year(&self) -> Option<i32> {
        self.year
    }

    fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }
}

impl PreviewItem for SeriesPreview {
    fn natural_id(&self) -> i32 {
        self.tvdb_id
    }

    fn status(&self) -> PreviewStatus {
        self.status
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn year(&self) -> Option<i32> {
        self.year
    }

    fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFilter {
    #[default]
    All,
    New,
    Duplicate,
    Skip,
}

impl PreviewFilter {
    pub fn matches(&self, status: PreviewStatus) -> bool {
        match self {
            PreviewFilter::All => true,
            PreviewFilter::New => status == PreviewStatus::New,
            PreviewFilter::Duplicate => status == PreviewStatus::Duplicate,
            PreviewFilter::Skip => status == PreviewStatus::Skip,
        }
    }
}

impl fmt::Display for PreviewFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PreviewFilter::All => "all",
            PreviewFilter::New => "new",
            PreviewFilter::Duplicate => "duplicate",
            PreviewFilter::Skip => "skip",
        })
    }
}

/// Set of ids picked for import. Only ids of `new` items can be members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selectable: BTreeSet<i32>,
    selected: BTreeSet<i32>,
}

impl Selection {
    /// Starts with every `new` item selected.
    pub fn from_items<T: PreviewItem>(items: &[T]) -> Self {
        let selectable: BTreeSet<i32> = items
            .iter()
            .filter(|i| i.status() == PreviewStatus::New)
            .map(|i| i.natural_id())
            .collect();
        Self {
            selected: selectable.clone(),
            selectable,
        }
    }

    /// Flips a single id. Ids that are not selectable are ignored.
    pub fn toggle_one(&mut self, id: i32) {
        if !self.selectable.contains(&id) {
            return;
        }
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// Clears a full selection, otherwise selects everything.
    pub fn toggle_all(&mut self) {
        if self.is_all_selected() {
            self.selected.clear();
        } else {
            self.selected = self.selectable.clone();
        }
    }

    pub fn is_all_selected(&self) -> bool {
        self.selected == self.selectable
    }

    pub fn is_selected(&self, id: i32) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_selectable(&self, id: i32) -> bool {
        self.selectable.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selectable_len(&self) -> usize {
        self.selectable.len()
    }

    pub fn ids(&self) -> Vec<i32> {
        self.selected.iter().copied().collect()
    }
}

/// A preview row prepared for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow<'a> {
    pub id: i32,
    pub title: &'a str,
    pub year: Option<i32>,
    pub status: PreviewStatus,
    pub skip_reason: Option<&'a str>,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCounts {
    pub all: usize,
    pub new: usize,
    pub duplicate: usize,
    pub skip: usize,
}

/// The received preview and the user's selection over it.
///
/// The preview itself never changes after arrival; only the selection and
/// the display filter do.
#[derive(Debug, Clone)]
pub struct PreviewSession {
    source_type: SourceType,
    preview: ImportPreview,
    selection: Selection,
    filter: PreviewFilter,
}

impl PreviewSession {
    pub fn new(source_type: SourceType, preview: ImportPreview, filter: PreviewFilter) -> Self {
        let selection = match source_type {
            SourceType::Radarr => Selection::from_items(&preview.movies),
            SourceType::Sonarr => Selection::from_items(&preview.series),
        };
        Self {
            source_type,
            preview,
            selection,
            filter,
        }
    }

    pub fn preview(&self) -> &ImportPreview {
        &self.preview
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn filter(&self) -> PreviewFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: PreviewFilter) {
        self.filter = filter;
    }

    pub fn toggle_one(&mut self, id: i32) {
        self.selection.toggle_one(id);
    }

    pub fn toggle_all(&mut self) {
        self.selection.toggle_all();
    }

    /// Rows that pass the current filter.
    pub fn visible_rows(&self) -> Vec<PreviewRow<'_>> {
        match self.source_type {
            SourceType::Radarr => self.rows(&self.preview.movies),
            SourceType::Sonarr => self.rows(&self.preview.series),
        }
    }

    fn rows<'a, T: PreviewItem>(&'a self, items: &'a [T]) -> Vec<PreviewRow<'a>> {
        items
            .iter()
            .filter(|i| self.filter.matches(i.status()))
            .map(|i| PreviewRow {
                id: i.natural_id(),
                title: i.title(),
                year: i.year(),
                status: i.status(),
                skip_reason: i.skip_reason(),
                selected: self.selection.is_selected(i.natural_id()),
            })
            .collect()
    }

    pub fn counts(&self) -> FilterCounts {
        let statuses: Vec<PreviewStatus> = match self.source_type {
            SourceType::Radarr => self.preview.movies.iter().map(|m| m.status).collect(),
            SourceType::Sonarr => self.preview.series.iter().map(|s| s.status).collect(),
        };
        FilterCounts {
            all: statuses.len(),
            new: statuses.iter().filter(|s| **s == PreviewStatus::New).count(),
            duplicate: statuses
                .iter()
                .filter(|s| **s == PreviewStatus::Duplicate)
                .count(),
            skip: statuses.iter().filter(|s| **s == PreviewStatus::Skip).count(),
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Adds the selection to `mappings` under the field for this media type.
    pub fn submission(&self, mut mappings: ImportMappings) -> Result<ImportMappings, WizardError> {
        if self.selection.is_empty() {
            return Err(WizardError::EmptySelection);
        }
        match self.source_type {
            SourceType::Radarr => {
                mappings.selected_movie_tmdb_ids = Some(self.selection.ids());
                mappings.selected_series_tvdb_ids = None;
            }
            SourceType::Sonarr => {
                mappings.selected_series_tvdb_ids = Some(self.selection.ids());
                mappings.selected_movie_tmdb_ids = None;
            }
        }
        Ok(mappings)
    }
}
