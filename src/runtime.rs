//! Per-greenhouse runtime state: status, timestamps, and the pulse-executor
//! mutual-exclusion lock (invariant 1, P1). One `GreenhouseRuntime` per
//! configured greenhouse; the registry-level lock around add/remove lives
//! in [`crate::controller::Controller`].

use crate::models::GreenhouseStatus;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

#[derive(Debug)]
pub struct GreenhouseRuntime {
    status: RwLock<GreenhouseStatus>,
    last_irrigation_at: RwLock<Option<DateTime<Utc>>>,
    last_prediction_at: RwLock<Option<DateTime<Utc>>>,
    /// Held for the entire duration of one `execute(decision)` call (§4.8).
    /// Acquired with `try_lock`: contention means "someone else is handling
    /// it", not a reason to queue.
    pulse_lock: Arc<Mutex<()>>,
}

impl Default for GreenhouseRuntime {
    fn default() -> Self {
        Self {
            status: RwLock::new(GreenhouseStatus::Idle),
            last_irrigation_at: RwLock::new(None),
            last_prediction_at: RwLock::new(None),
            pulse_lock: Arc::new(Mutex::new(())),
        }
    }
}

impl GreenhouseRuntime {
    pub async fn status(&self) -> GreenhouseStatus {
        *self.status.read().await
    }

    pub async fn set_status(&self, status: GreenhouseStatus) {
        *self.status.write().await = status;
    }

    pub async fn last_irrigation_at(&self) -> Option<DateTime<Utc>> {
        *self.last_irrigation_at.read().await
    }

    pub async fn record_irrigation(&self, at: DateTime<Utc>) {
        *self.last_irrigation_at.write().await = Some(at);
    }

    pub async fn last_prediction_at(&self) -> Option<DateTime<Utc>> {
        *self.last_prediction_at.read().await
    }

    pub async fn record_prediction(&self, at: DateTime<Utc>) {
        *self.last_prediction_at.write().await = Some(at);
    }

    /// Attempts to acquire the pulse-executor lock without waiting. Returns
    /// `None` immediately if another sequence already holds it — callers
    /// must not queue on contention (§4.8).
    pub fn try_acquire_pulse_lock(&self) -> Option<OwnedMutexGuard<()>> {
        self.pulse_lock.clone().try_lock_owned().ok()
    }
}

/// Registry of runtimes, keyed by greenhouse id, guarded by a single
/// registry-level lock for add/remove (§5 shared-resource policy).
#[derive(Debug, Default)]
pub struct RuntimeRegistry {
    runtimes: RwLock<HashMap<String, Arc<GreenhouseRuntime>>>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self {
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, greenhouse_id: &str) -> Arc<GreenhouseRuntime> {
        if let Some(runtime) = self.runtimes.read().await.get(greenhouse_id) {
            return runtime.clone();
        }
        let mut runtimes = self.runtimes.write().await;
        runtimes
            .entry(greenhouse_id.to_string())
            .or_insert_with(|| Arc::new(GreenhouseRuntime::default()))
            .clone()
    }

    pub async fn get(&self, greenhouse_id: &str) -> Option<Arc<GreenhouseRuntime>> {
        self.runtimes.read().await.get(greenhouse_id).cloned()
    }

    pub async fn remove(&self, greenhouse_id: &str) {
        let mut runtimes = self.runtimes.write().await;
        runtimes.remove(greenhouse_id);
    }

    pub async fn ids(&self) -> Vec<String> {
        self.runtimes.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_lock_rejects_concurrent_acquisition() {
        let runtime = GreenhouseRuntime::default();
        let first = runtime.try_acquire_pulse_lock();
        assert!(first.is_some());
        assert!(runtime.try_acquire_pulse_lock().is_none());
        drop(first);
        assert!(runtime.try_acquire_pulse_lock().is_some());
    }

    #[tokio::test]
    async fn get_or_create_returns_same_instance() {
        let registry = RuntimeRegistry::new();
        let a = registry.get_or_create("gh-1").await;
        let b = registry.get_or_create("gh-1").await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn status_defaults_to_idle() {
        let runtime = GreenhouseRuntime::default();
        assert_eq!(runtime.status().await, GreenhouseStatus::Idle);
    }
}
