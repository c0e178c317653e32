use serde::{Deserialize, Serialize};

pub const MAX_RECENT_SEARCHES: usize = 20;

/// Most-recent-first list of unique search terms, bounded to
/// [`MAX_RECENT_SEARCHES`]. Matching is exact and case-sensitive.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentSearchList {
    entries: Vec<String>,
}

impl RecentSearchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from persisted entries, dropping blanks and repeated
    /// terms (first occurrence wins) and truncating to the bound.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for entry in entries {
            let entry = entry.into();
            if list.entries.len() == MAX_RECENT_SEARCHES {
                break;
            }
            if is_blank(&entry) || list.contains(&entry) {
                continue;
            }
            list.entries.push(entry);
        }
        list
    }

    /// Moves `entry` to the front, inserting it if absent. Returns `false`
    /// without touching the list when the entry is blank.
    pub fn push_front(&mut self, entry: &str) -> bool {
        if is_blank(entry) {
            return false;
        }
        self.entries.retain(|existing| existing != entry);
        self.entries.insert(0, entry.to_string());
        self.entries.truncate(MAX_RECENT_SEARCHES);
        true
    }

    pub fn remove(&mut self, entry: &str) -> bool {
        match self.entries.iter().position(|existing| existing == entry) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.iter().any(|existing| existing == entry)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_blank(entry: &str) -> bool {
    entry.trim().is_empty()
}
