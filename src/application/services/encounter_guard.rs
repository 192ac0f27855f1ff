//! Per-encounter serialization - the concurrency guard
//!
//! All mutating intents against one encounter pass through a single
//! `tokio::sync::Mutex` scoped to the encounter id, making the engine
//! logically single-writer per encounter. Acquisition is bounded by a
//! timeout so a stuck encounter cannot starve its participants; a timed
//! out intent is rejected with a retryable error. An intent cancelled
//! while still waiting for the slot (its future dropped) has no effect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::errors::EngineError;
use crate::domain::value_objects::EncounterId;

/// Serializes mutating intents per encounter id.
pub struct ConcurrencyGuard {
    locks: Mutex<HashMap<EncounterId, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl ConcurrencyGuard {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Acquire the serialization slot for an encounter, waiting at most
    /// the configured timeout.
    pub async fn acquire(
        &self,
        encounter_id: EncounterId,
    ) -> Result<OwnedMutexGuard<()>, EngineError> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(encounter_id)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| EngineError::LockTimeout)
    }

    /// Drop the lock entry for an ended encounter. Intents already
    /// holding the old slot finish undisturbed.
    pub async fn remove(&self, encounter_id: EncounterId) {
        self.locks.lock().await.remove(&encounter_id);
    }
}
