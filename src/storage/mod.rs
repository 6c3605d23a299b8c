//! Observation storage backends.
//!
//! The [`Storage`] trait defines how an experiment's observations are
//! persisted and retrieved. Every [`Experiment`](crate::Experiment) owns an
//! `Arc<dyn Storage>`, so history is never shared between experiments.
//!
//! # Available backends
//!
//! | Backend | Description | Feature flag |
//! |---------|-------------|-------------|
//! | [`MemoryStorage`] | In-memory `Vec` behind a read-write lock (the default) | none |
//! | `JournalStorage` | JSONL file with `fs2` file locking | `journal` |
//!
//! Switch to `JournalStorage` to keep an experiment's history across
//! process restarts: reopening the journal restores every recorded
//! observation, and the experiment skips random initialization.

#[cfg(feature = "journal")]
mod journal;

use std::sync::Arc;

#[cfg(feature = "journal")]
pub use journal::JournalStorage;
use parking_lot::RwLock;

mod memory;
pub use memory::MemoryStorage;

use crate::types::Observation;

/// Trait for storing and retrieving recorded observations.
///
/// Implementations must be `Send + Sync` because the service hands
/// experiments to whichever thread serves the request.
pub trait Storage: Send + Sync {
    /// Append an observation to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if a persistent backend cannot write the
    /// observation. The observation must then not be visible in
    /// [`observations_arc`](Storage::observations_arc) either.
    fn push(&self, observation: Observation) -> crate::Result<()>;

    /// Return a reference to the in-memory observation buffer.
    ///
    /// Callers may acquire a read lock for allocation-free access.
    fn observations_arc(&self) -> &Arc<RwLock<Vec<Observation>>>;

    /// Reload from an external source. Return `true` if the in-memory
    /// buffer was updated.
    ///
    /// The default implementation is a no-op that returns `false`.
    fn refresh(&self) -> bool {
        false
    }
}
