//! Client configuration: stored copy plus caller overrides.

use serde_json::Value;

use analyst_core::ports::StoragePort;
use analyst_types::config::ClientConfig;

pub const CONFIG_STORAGE_KEY: &str = "repo_analyst.config";

/// Load the stored config, merge `overrides` over it and persist the result.
/// Unreadable stored or supplied values fall back to defaults.
pub fn load_config(storage: &dyn StoragePort, overrides: Option<Value>) -> ClientConfig {
    let stored = match storage.get(CONFIG_STORAGE_KEY) {
        Ok(Some(json)) => match serde_json::from_str::<ClientConfig>(&json) {
            Ok(config) => {
                log::info!("Config restored from {}", storage.backend_name());
                config
            }
            Err(e) => {
                log::warn!("Ignoring unreadable stored config: {}", e);
                ClientConfig::default()
            }
        },
        Ok(None) => ClientConfig::default(),
        Err(e) => {
            log::warn!("Config read failed: {}", e);
            ClientConfig::default()
        }
    };

    let Some(overrides) = overrides.filter(Value::is_object) else {
        return stored;
    };

    let config = match serde_json::to_value(&stored) {
        Ok(mut merged) => {
            merge_json(&mut merged, overrides);
            serde_json::from_value(merged).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config override: {}", e);
                stored.clone()
            })
        }
        Err(e) => {
            log::warn!("Config encode failed: {}", e);
            stored.clone()
        }
    };

    if config != stored {
        save_config(storage, &config);
    }
    config
}

fn save_config(storage: &dyn StoragePort, config: &ClientConfig) {
    match serde_json::to_string(config) {
        Ok(json) => match storage.set(CONFIG_STORAGE_KEY, &json) {
            Ok(()) => log::info!("Config saved to storage"),
            Err(e) => log::warn!("Config save failed: {}", e),
        },
        Err(e) => log::warn!("Config encode failed: {}", e),
    }
}

/// Recursive object merge; non-object values in `over` replace `base`.
pub fn merge_json(base: &mut Value, over: Value) {
    match (base, over) {
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
