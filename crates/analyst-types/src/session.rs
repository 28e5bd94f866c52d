use serde::{Deserialize, Serialize};

const GITHUB_BASE: &str = "https://github.com";

/// An `owner/name` pair identifying a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`, also used as the history deduplication key
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Normalized `https://github.com/owner/name`
    pub fn url(&self) -> String {
        format!("{}/{}/{}", GITHUB_BASE, self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Persisted form of the last analysed repository: `{owner, repo, full_name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryHint {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub full_name: String,
}

impl From<&RepositoryRef> for RepositoryHint {
    fn from(r: &RepositoryRef) -> Self {
        Self {
            owner: r.owner.clone(),
            repo: r.name.clone(),
            full_name: r.full_name(),
        }
    }
}

impl From<RepositoryHint> for RepositoryRef {
    fn from(h: RepositoryHint) -> Self {
        RepositoryRef::new(h.owner, h.repo)
    }
}

/// A resumable backend conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Option<String>,
    pub repository: Option<RepositoryRef>,
    pub created_at: String,
    pub turn_count: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: None,
            repository: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            turn_count: 0,
        }
    }

    pub fn is_resumable(&self) -> bool {
        self.session_id.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
