//! Pick the best available storage backend.
//!
//! Priority: localStorage → Memory (fallback)

use std::rc::Rc;

use analyst_core::ports::StoragePort;

use super::{LocalStorage, MemoryStorage};

/// Open localStorage, or fall back to memory when it is unusable.
/// Returns a trait object so callers are backend-agnostic.
pub fn auto_detect_storage() -> Rc<dyn StoragePort> {
    match LocalStorage::open().and_then(check_writable) {
        Ok(local) => {
            log::info!("Storage backend: localStorage");
            Rc::new(local)
        }
        Err(e) => {
            log::warn!("localStorage unavailable ({}), falling back to memory", e);
            Rc::new(MemoryStorage::new())
        }
    }
}

/// Some browsers expose localStorage but throw on write (quota 0).
fn check_writable(storage: LocalStorage) -> analyst_types::Result<LocalStorage> {
    const WRITE_CHECK_KEY: &str = "repo_analyst.__write_check";
    storage.set(WRITE_CHECK_KEY, "1")?;
    storage.delete(WRITE_CHECK_KEY)?;
    Ok(storage)
}
