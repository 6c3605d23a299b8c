use std::sync::Arc;

use parking_lot::RwLock;

use super::Storage;
use crate::types::Observation;

/// In-memory observation storage (the default).
///
/// This is a thin wrapper around `Arc<RwLock<Vec<Observation>>>`.
pub struct MemoryStorage {
    observations: Arc<RwLock<Vec<Observation>>>,
}

impl MemoryStorage {
    /// Creates a new, empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_observations(Vec::new())
    }

    /// Creates an in-memory store pre-populated with `observations`.
    #[must_use]
    pub fn with_observations(observations: Vec<Observation>) -> Self {
        Self {
            observations: Arc::new(RwLock::new(observations)),
        }
    }

    /// Replace the buffer if `loaded` holds more observations.
    #[cfg(feature = "journal")]
    pub(crate) fn replace_if_longer(&self, loaded: Vec<Observation>) -> bool {
        let mut guard = self.observations.write();
        if loaded.len() > guard.len() {
            *guard = loaded;
            true
        } else {
            false
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn push(&self, observation: Observation) -> crate::Result<()> {
        self.observations.write().push(observation);
        Ok(())
    }

    fn observations_arc(&self) -> &Arc<RwLock<Vec<Observation>>> {
        &self.observations
    }
}
