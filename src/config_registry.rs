//! Per-greenhouse configuration registry (C3). Grounded on the
//! `RwLock<HashMap<..>>` pattern used by the teacher's in-memory session
//! store (`core-server-rs/src/auth/mod.rs`'s `AuthManager`).

use crate::models::GreenhouseConfig;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: RwLock<HashMap<String, GreenhouseConfig>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// Atomic replacement: a full config record is swapped in under one
    /// write-lock acquisition.
    pub async fn put(&self, config: GreenhouseConfig) {
        let mut configs = self.configs.write().await;
        configs.insert(config.greenhouse_id.clone(), config);
    }

    pub async fn get(&self, greenhouse_id: &str) -> Option<GreenhouseConfig> {
        let configs = self.configs.read().await;
        configs.get(greenhouse_id).cloned()
    }

    pub async fn remove(&self, greenhouse_id: &str) -> Option<GreenhouseConfig> {
        let mut configs = self.configs.write().await;
        configs.remove(greenhouse_id)
    }

    pub async fn all_ids(&self) -> Vec<String> {
        let configs = self.configs.read().await;
        configs.keys().cloned().collect()
    }

    pub async fn contains(&self, greenhouse_id: &str) -> bool {
        let configs = self.configs.read().await;
        configs.contains_key(greenhouse_id)
    }
}
