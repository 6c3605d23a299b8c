use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Experiment, ExperimentId};
use crate::config::ExperimentConfig;
use crate::types::{ExperimentStatus, Observation};

/// A serializable snapshot of an experiment's state.
///
/// The surrogate model is not included: it is refitted from the
/// observations on the next [`ask`](Experiment::ask). Neither is an
/// outstanding suggestion, which must be asked for again after a reload.
///
/// # Schema versioning
///
/// The current `version` is `1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSnapshot {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// The experiment id.
    pub id: ExperimentId,
    /// The experiment configuration.
    pub config: ExperimentConfig,
    /// Lifecycle state at the time of the snapshot.
    pub status: ExperimentStatus,
    /// When the experiment was created.
    pub created_at: DateTime<Utc>,
    /// Every recorded observation, in epoch order.
    pub observations: Vec<Observation>,
}

impl Experiment {
    /// Save the experiment state to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or written.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot();

        // Write to a sibling temp file, then rename over the target.
        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let file = std::fs::File::create(&tmp_path)?;
        serde_json::to_writer_pretty(file, &snapshot).map_err(std::io::Error::other)?;
        std::fs::rename(&tmp_path, path)
    }

    /// Load an experiment from a JSON file written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, parsed, or the
    /// snapshot is rejected by [`from_snapshot`](Self::from_snapshot).
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let snapshot: ExperimentSnapshot = serde_json::from_reader(file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Self::from_snapshot(snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
