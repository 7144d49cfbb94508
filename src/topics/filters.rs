//! Exclude filters: operator-managed patterns that hide topics from the tree.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::topics::matcher::{has_wildcard, match_filter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeFilter {
    pub pattern: String,
    pub enabled: bool,
}

impl ExcludeFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), enabled: true }
    }

    /// Enabled and carrying a non-blank pattern.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.pattern.trim().is_empty()
    }

    /// A wildcard or multi-level pattern is matched as a topic filter. A bare
    /// single-level keyword ("read") also hides every topic that has it as one
    /// of its levels.
    pub fn excludes(&self, topic: &str) -> bool {
        let pattern = self.pattern.trim();
        if match_filter(topic, pattern) {
            return true;
        }
        is_keyword(pattern) && topic.split('/').any(|level| level == pattern)
    }
}

fn is_keyword(pattern: &str) -> bool {
    !pattern.is_empty() && !pattern.contains('/') && !has_wildcard(pattern)
}

pub fn default_exclude_filters() -> Vec<ExcludeFilter> {
    ["read", "data", "config"].into_iter().map(ExcludeFilter::new).collect()
}

/// Appends any missing default pattern, disabled, so a persisted list keeps
/// the operator's choices but still offers the defaults.
pub fn ensure_default_filters(filters: Vec<ExcludeFilter>) -> Vec<ExcludeFilter> {
    let mut filters = filters;
    for default in default_exclude_filters() {
        if !filters.iter().any(|f| f.pattern == default.pattern) {
            filters.push(ExcludeFilter { enabled: false, ..default });
        }
    }
    filters
}

pub fn filter_option_name(filter: &ExcludeFilter) -> String {
    let check = if filter.enabled { "[x]" } else { "[ ]" };
    let pattern = if filter.pattern.is_empty() { "(empty)" } else { filter.pattern.as_str() };
    format!("{} {}", check, pattern)
}

pub fn toggle_filter(filters: &[ExcludeFilter], index: usize) -> Vec<ExcludeFilter> {
    filters
        .iter()
        .enumerate()
        .map(|(i, filter)| {
            let mut filter = filter.clone();
            if i == index {
                filter.enabled = !filter.enabled;
            }
            filter
        })
        .collect()
}

pub fn delete_filter(filters: &[ExcludeFilter], index: usize) -> Vec<ExcludeFilter> {
    filters
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, filter)| filter.clone())
        .collect()
}

/// Trimmed pattern, or an error when nothing is left.
pub fn validate_filter_pattern(value: &str) -> Result<&str, ValidationError> {
    match value.trim() {
        "" => Err(ValidationError::EmptyFilterPattern),
        pattern => Ok(pattern),
    }
}

pub fn add_filter(filters: &[ExcludeFilter], value: &str) -> Result<Vec<ExcludeFilter>, ValidationError> {
    let pattern = validate_filter_pattern(value)?;
    let mut next = filters.to_vec();
    next.push(ExcludeFilter::new(pattern));
    Ok(next)
}

/// An out-of-range index leaves the list untouched.
pub fn edit_filter(filters: &[ExcludeFilter], index: usize, value: &str) -> Result<Vec<ExcludeFilter>, ValidationError> {
    let pattern = validate_filter_pattern(value)?;
    let mut next = filters.to_vec();
    if let Some(filter) = next.get_mut(index) {
        filter.pattern = pattern.to_string();
    }
    Ok(next)
}
