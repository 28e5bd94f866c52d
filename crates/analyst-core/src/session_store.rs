//! Durable session identity.
//!
//! Every setter mirrors into storage under two fixed keys. Storage failures
//! are logged and swallowed; a corrupted or unreadable store hydrates as an
//! empty session.

use std::rc::Rc;

use analyst_types::session::{RepositoryHint, RepositoryRef, Session};

use crate::ports::StoragePort;

pub const SESSION_ID_KEY: &str = "repo_analyst.session_id";
pub const REPOSITORY_KEY: &str = "repo_analyst.repository";

pub struct SessionStore {
    storage: Rc<dyn StoragePort>,
    session: Session,
}

impl SessionStore {
    /// Hydrate from storage, falling back to an empty session.
    pub fn load(storage: Rc<dyn StoragePort>) -> Self {
        let mut session = Session::new();

        match storage.get(SESSION_ID_KEY) {
            Ok(Some(id)) if !id.trim().is_empty() => session.session_id = Some(id),
            Ok(_) => {}
            Err(e) => log::warn!("Could not read session id ({}), starting fresh", e),
        }

        match storage.get(REPOSITORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<RepositoryHint>(&raw) {
                Ok(hint) => session.repository = Some(hint.into()),
                Err(e) => log::warn!("Discarding corrupted repository hint: {}", e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Could not read repository hint: {}", e),
        }

        if session.is_resumable() {
            log::info!(
                "Resuming session from {} storage",
                storage.backend_name()
            );
        }

        Self { storage, session }
    }

    pub fn get(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.session_id.as_deref()
    }

    pub fn set_session_id(&mut self, id: Option<String>) {
        let result = match &id {
            Some(id) => self.storage.set(SESSION_ID_KEY, id),
            None => self.storage.delete(SESSION_ID_KEY),
        };
        if let Err(e) = result {
            log::warn!("Failed to persist session id: {}", e);
        }
        self.session.session_id = id;
    }

    pub fn set_repository(&mut self, repository: Option<RepositoryRef>) {
        let result = match &repository {
            Some(repo) => serde_json::to_string(&RepositoryHint::from(repo))
                .map_err(Into::into)
                .and_then(|json| self.storage.set(REPOSITORY_KEY, &json)),
            None => self.storage.delete(REPOSITORY_KEY),
        };
        if let Err(e) = result {
            log::warn!("Failed to persist repository hint: {}", e);
        }
        self.session.repository = repository;
    }

    pub fn record_turn(&mut self) {
        self.session.turn_count += 1;
    }

    /// Forget the conversation: both keys and all in-memory state.
    pub fn clear(&mut self) {
        for key in [SESSION_ID_KEY, REPOSITORY_KEY] {
            if let Err(e) = self.storage.delete(key) {
                log::warn!("Failed to remove {}: {}", key, e);
            }
        }
        self.session = Session::new();
    }
}
