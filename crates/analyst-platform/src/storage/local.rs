//! localStorage backend.
//! Persistent across page reloads, shared by every tab of the origin.

use analyst_core::ports::StoragePort;
use analyst_types::{AnalystError, Result};

pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    /// Open the window's localStorage. Fails when there is no window or
    /// storage is disabled (private mode, sandboxed iframe).
    pub fn open() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| AnalystError::Storage("No window object".to_string()))?;

        let storage = window
            .local_storage()
            .map_err(|e| AnalystError::Storage(format!("{:?}", e)))?
            .ok_or_else(|| AnalystError::Storage("localStorage not available".to_string()))?;

        Ok(Self { storage })
    }
}

impl StoragePort for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| AnalystError::Storage(format!("{:?}", e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| AnalystError::Storage(format!("{:?}", e)))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| AnalystError::Storage(format!("{:?}", e)))
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let len = self
            .storage
            .length()
            .map_err(|e| AnalystError::Storage(format!("{:?}", e)))?;

        let mut keys = Vec::new();
        for i in 0..len {
            if let Ok(Some(key)) = self.storage.key(i) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    fn backend_name(&self) -> &str {
        "localstorage"
    }
}
