//! Domain inclusion policy applied to changes before they are published.

use serde::Deserialize;

/// Suffix-based domain filter.
///
/// A name is included when it lies under one of `filters` (or no filters
/// are set) and under none of `exclude`. Matching is case-insensitive,
/// label-aligned and ignores trailing dots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DomainFilter {
    pub filters: Vec<String>,
    pub exclude: Vec<String>,
}

impl DomainFilter {
    pub fn new<S: Into<String>>(filters: impl IntoIterator<Item = S>) -> Self {
        DomainFilter {
            filters: filters.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn with_exclusions<S: Into<String>>(mut self, exclude: impl IntoIterator<Item = S>) -> Self {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.filters.iter().any(|f| !normalize(f).is_empty())
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = normalize(name);
        let included = !self.is_configured()
            || self
                .filters
                .iter()
                .any(|filter| has_suffix(&name, &normalize(filter)));
        included
            && !self
                .exclude
                .iter()
                .map(|e| normalize(e))
                .any(|exclude| !exclude.is_empty() && has_suffix(&name, &exclude))
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn has_suffix(name: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return true;
    }
    match name.strip_suffix(suffix) {
        Some("") => true,
        Some(rest) => rest.ends_with('.'),
        None => false,
    }
}
