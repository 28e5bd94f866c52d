//! Browser-style navigation over completed analyses.
//!
//! Adding an entry while the cursor is behind the end discards the forward
//! entries first, so the cursor always ends on the newest entry.

use serde::{Deserialize, Serialize};

use analyst_types::analysis::AnalysisViewModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub view_model: AnalysisViewModel,
    /// `owner/name`, empty when the view model has no repository
    pub repository_key: String,
    pub index: usize,
}

/// One row of the compare picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueRepository {
    pub key: String,
    pub owner: String,
    pub repo: String,
    pub score: Option<f64>,
    /// History index of the first analysis of this repository
    pub index: usize,
}

#[derive(Debug, Default)]
pub struct HistoryNavigator {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed analysis and move the cursor onto it.
    pub fn add(&mut self, view_model: AnalysisViewModel) -> usize {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }
        let index = self.entries.len();
        self.entries.push(HistoryEntry {
            repository_key: view_model.repository_key().unwrap_or_default(),
            view_model,
            index,
        });
        self.cursor = Some(index);
        index
    }

    pub fn go_back(&mut self) -> Option<&AnalysisViewModel> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                self.current()
            }
            _ => None,
        }
    }

    pub fn go_forward(&mut self) -> Option<&AnalysisViewModel> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                self.current()
            }
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&AnalysisViewModel> {
        self.cursor
            .and_then(|c| self.entries.get(c))
            .map(|e| &e.view_model)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Latest entry for a repository key
    pub fn find(&self, key: &str) -> Option<&HistoryEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.repository_key.eq_ignore_ascii_case(key))
    }

    /// Distinct repositories in first-seen order
    pub fn unique_repositories(&self) -> Vec<UniqueRepository> {
        let mut out: Vec<UniqueRepository> = Vec::new();
        for entry in &self.entries {
            let Some(repo) = &entry.view_model.repository else {
                continue;
            };
            if out.iter().any(|u| u.key.eq_ignore_ascii_case(&entry.repository_key)) {
                continue;
            }
            out.push(UniqueRepository {
                key: entry.repository_key.clone(),
                owner: repo.owner.clone(),
                repo: repo.name.clone(),
                score: entry.view_model.score(),
                index: entry.index,
            });
        }
        out
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}

/// Repositories picked for comparison, at most [`CompareSelection::MAX`].
#[derive(Debug, Default, Clone)]
pub struct CompareSelection {
    keys: Vec<String>,
}

impl CompareSelection {
    pub const MAX: usize = 2;

    /// Toggle a key. Returns false when the selection is full and the key
    /// was not already selected.
    pub fn toggle(&mut self, key: &str) -> bool {
        if let Some(pos) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(pos);
            return true;
        }
        if self.keys.len() >= Self::MAX {
            return false;
        }
        self.keys.push(key.to_string());
        true
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_ready(&self) -> bool {
        self.keys.len() == Self::MAX
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
