//! JSONL-based journal storage backend.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::{Mutex, RwLock};

use super::{MemoryStorage, Storage};
use crate::types::Observation;

/// A storage backend that appends observations as JSON lines to a file.
///
/// Observations are kept in memory for fast read access and written through
/// to the journal before they become visible. Writes take an exclusive file
/// lock, reads a shared one, so a second process may tail the same file.
///
/// # Examples
///
/// ```no_run
/// use boaas::storage::JournalStorage;
///
/// let storage = JournalStorage::open("experiment.jsonl").unwrap();
/// ```
pub struct JournalStorage {
    memory: MemoryStorage,
    path: PathBuf,
    /// Serialise in-process writes so we only hold the file lock briefly.
    write_lock: Mutex<()>,
}

impl JournalStorage {
    /// Creates a journal that writes to `path` without loading it.
    ///
    /// The file is created on the first write. Existing observations are
    /// picked up by [`refresh`](Storage::refresh); use
    /// [`open`](Self::open) to load them eagerly.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            memory: MemoryStorage::new(),
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens a journal file and loads all stored observations.
    ///
    /// A missing file yields an empty storage.
    ///
    /// # Errors
    ///
    /// Returns a [`Storage`](crate::Error::Storage) error if the file exists
    /// but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let observations = load_observations(&path)?;
        Ok(Self {
            memory: MemoryStorage::with_observations(observations),
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// The journal file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, observation: &Observation) -> crate::Result<()> {
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(storage_err)?;

        file.lock_exclusive().map_err(storage_err)?;

        let line = serde_json::to_string(observation).map_err(storage_err)?;
        writeln!(file, "{line}").map_err(storage_err)?;
        file.flush().map_err(storage_err)?;

        FileExt::unlock(&file).map_err(storage_err)?;

        Ok(())
    }
}

impl Storage for JournalStorage {
    fn push(&self, observation: Observation) -> crate::Result<()> {
        self.append(&observation)?;
        self.memory.push(observation)
    }

    fn observations_arc(&self) -> &Arc<RwLock<Vec<Observation>>> {
        self.memory.observations_arc()
    }

    fn refresh(&self) -> bool {
        let Ok(loaded) = load_observations(&self.path) else {
            return false;
        };
        self.memory.replace_if_longer(loaded)
    }
}

fn storage_err(e: impl ToString) -> crate::Error {
    crate::Error::Storage(e.to_string())
}

/// Read all observations from a JSONL file. Returns an empty vec if the
/// file does not exist.
fn load_observations(path: &Path) -> crate::Result<Vec<Observation>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(storage_err(e)),
    };

    FileExt::lock_shared(&file).map_err(storage_err)?;

    let reader = BufReader::new(&file);
    let mut observations = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(storage_err)?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        observations.push(serde_json::from_str(line).map_err(storage_err)?);
    }

    FileExt::unlock(&file).map_err(storage_err)?;

    Ok(observations)
}
