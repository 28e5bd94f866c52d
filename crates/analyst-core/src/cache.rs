//! Per-repository analysis cache with a fixed time-to-live.
//!
//! Keys are `repo_analyst.analysis.` followed by the base64 of the
//! normalized repository URL.

use std::rc::Rc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use analyst_types::{Result, analysis::AnalysisViewModel, session::RepositoryRef};

use crate::ports::StoragePort;

pub const CACHE_PREFIX: &str = "repo_analyst.analysis.";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAnalysis {
    url: String,
    stored_at_ms: i64,
    view_model: AnalysisViewModel,
}

pub struct AnalysisCache {
    storage: Rc<dyn StoragePort>,
    ttl_ms: i64,
}

impl AnalysisCache {
    pub fn new(storage: Rc<dyn StoragePort>, ttl_secs: i64) -> Self {
        Self {
            storage,
            ttl_ms: ttl_secs.saturating_mul(1000),
        }
    }

    pub fn key_for(repository: &RepositoryRef) -> String {
        format!("{}{}", CACHE_PREFIX, STANDARD.encode(repository.url()))
    }

    pub fn lookup(&self, repository: &RepositoryRef) -> Option<AnalysisViewModel> {
        self.lookup_at(repository, Utc::now())
    }

    /// Fresh entries are returned; expired or unreadable ones are removed.
    pub fn lookup_at(
        &self,
        repository: &RepositoryRef,
        now: DateTime<Utc>,
    ) -> Option<AnalysisViewModel> {
        let key = Self::key_for(repository);
        let raw = match self.storage.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Analysis cache read failed: {}", e);
                return None;
            }
        };

        let entry: CachedAnalysis = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Dropping corrupted cache entry for {}: {}", repository, e);
                self.remove_key(&key);
                return None;
            }
        };

        if self.is_expired(entry.stored_at_ms, now) {
            log::debug!("Cache entry for {} expired", repository);
            self.remove_key(&key);
            return None;
        }

        log::info!("Analysis cache hit for {}", repository);
        Some(entry.view_model)
    }

    pub fn store(&self, repository: &RepositoryRef, view_model: &AnalysisViewModel) {
        if let Err(e) = self.store_at(repository, view_model, Utc::now()) {
            log::warn!("Failed to cache analysis for {}: {}", repository, e);
        }
    }

    pub fn store_at(
        &self,
        repository: &RepositoryRef,
        view_model: &AnalysisViewModel,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let entry = CachedAnalysis {
            url: repository.url(),
            stored_at_ms: now.timestamp_millis(),
            view_model: view_model.clone(),
        };
        let json = serde_json::to_string(&entry)?;
        self.storage.set(&Self::key_for(repository), &json)
    }

    /// Remove every expired entry; returns how many were dropped.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let keys = match self.storage.list_keys(CACHE_PREFIX) {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Cannot list cache entries: {}", e);
                return 0;
            }
        };

        let mut purged = 0;
        for key in keys {
            let stale = match self.storage.get(&key) {
                Ok(Some(raw)) => serde_json::from_str::<CachedAnalysis>(&raw)
                    .map(|entry| self.is_expired(entry.stored_at_ms, now))
                    .unwrap_or(true),
                _ => false,
            };
            if stale {
                self.remove_key(&key);
                purged += 1;
            }
        }
        purged
    }

    fn is_expired(&self, stored_at_ms: i64, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - stored_at_ms >= self.ttl_ms
    }

    fn remove_key(&self, key: &str) {
        if let Err(e) = self.storage.delete(key) {
            log::warn!("Failed to remove cache entry {}: {}", key, e);
        }
    }
}
