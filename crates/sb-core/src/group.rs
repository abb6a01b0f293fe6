//! The `Group` record

use serde::{Deserialize, Serialize};

/// A named, user-defined collection of blocked base domains.
///
/// Serialized as `{"title", "websites", "active", "expanded"}`. The
/// `expanded` flag only records whether an editor shows the group unfolded;
/// it never affects blocking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique key across all groups
    pub title: String,
    /// Canonical base domains in insertion order, no repeats
    #[serde(default)]
    pub websites: Vec<String>,
    /// Only active groups contribute block patterns
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub expanded: bool,
}

impl Group {
    /// Create a fresh group: no websites, active and expanded.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            websites: Vec::new(),
            active: true,
            expanded: true,
        }
    }

    /// Check whether a canonical domain is already in this group.
    pub fn contains(&self, website: &str) -> bool {
        self.websites.iter().any(|w| w == website)
    }
}
