use crate::models::{SourceQualityProfile, SourceRootFolder, TargetQualityProfile, TargetRootFolder};
use std::collections::BTreeMap;

pub trait Matchable {
    type Key: Ord + Clone;
    fn mapping_key(&self) -> Self::Key;
    fn match_text(&self) -> &str;
}

pub trait Candidate {
    fn candidate_id(&self) -> i32;
    fn match_text(&self) -> &str;
}

impl Matchable for SourceRootFolder {
    type Key = String;

    fn mapping_key(&self) -> String {
        self.path.clone()
    }

    fn match_text(&self) -> &str {
        &self.path
    }
}

impl Matchable for SourceQualityProfile {
    type Key = i32;

    fn mapping_key(&self) -> i32 {
        self.id
    }

    fn match_text(&self) -> &str {
        &self.name
    }
}

impl Candidate for TargetRootFolder {
    fn candidate_id(&self) -> i32 {
        self.id
    }

    fn match_text(&self) -> &str {
        &self.path
    }
}

impl Candidate for TargetQualityProfile {
    fn candidate_id(&self) -> i32 {
        self.id
    }

    fn match_text(&self) -> &str {
        &self.name
    }
}

pub fn best_match<T: Candidate>(source: &str, targets: &[T]) -> Option<i32> {
    let source = source.to_lowercase();
    let normalized: Vec<(String, i32)> = targets
        .iter()
        .map(|t| (t.match_text().to_lowercase(), t.candidate_id()))
        .collect();

    if let Some((_, id)) = normalized.iter().find(|(key, _)| *key == source) {
        return Some(*id);
    }

    // An empty key would be a substring of everything.
    if source.is_empty() {
        return None;
    }

    normalized
        .iter()
        .filter(|(key, _)| !key.is_empty())
        .find(|(key, _)| source.contains(key.as_str()) || key.contains(source.as_str()))
        .map(|(_, id)| *id)
}

/// Case-insensitive exact match first, then the first substring hit in
/// target order. Unmatched source items are absent from the result.
pub fn auto_match<S, T>(sources: &[S], targets: &[T]) -> BTreeMap<S::Key, i32>
where
    S: Matchable,
    T: Candidate,
{
    sources
        .iter()
        .filter_map(|s| best_match(s.match_text(), targets).map(|id| (s.mapping_key(), id)))
        .collect()
}
