//! JSON file implementation of the `FlagStore` trait.
//!
//! The whole flag table lives in one small JSON document. Writes go to a
//! sibling temporary file that is renamed over the original, so a crash
//! never leaves a half-written table behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use phaseflow_core::error::FlowError;
use phaseflow_core::flag::{FlagKey, FlagStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct FlagFile {
    version: u32,
    flags: BTreeMap<String, i64>,
}

/// File-backed flag store.
#[derive(Debug)]
pub struct JsonFileFlagStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl JsonFileFlagStore {
    /// Creates a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, FlowError> {
        self.lock
            .lock()
            .map_err(|_| FlowError::Store("flag store lock poisoned".to_owned()))
    }

    fn read(&self) -> Result<FlagFile, FlowError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(FlagFile::default()),
            Err(err) => {
                return Err(FlowError::Store(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };
        let file: FlagFile = serde_json::from_str(&text).map_err(|e| {
            FlowError::Store(format!("corrupt flag file {}: {e}", self.path.display()))
        })?;
        if file.version != FORMAT_VERSION {
            return Err(FlowError::Store(format!(
                "unsupported flag file version {} in {}",
                file.version,
                self.path.display()
            )));
        }
        Ok(file)
    }

    fn write(&self, file: &FlagFile) -> Result<(), FlowError> {
        let io_err = |e: std::io::Error| {
            FlowError::Store(format!("failed to write {}: {e}", self.path.display()))
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(file)
            .map_err(|e| FlowError::Store(format!("flag serialization failed: {e}")))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(io_err)?;
        fs::rename(&staging, &self.path).map_err(io_err)
    }
}

impl FlagStore for JsonFileFlagStore {
    #[instrument(skip(self, key), fields(path = %self.path.display(), flag = %key))]
    fn get(&self, key: &FlagKey) -> Result<i64, FlowError> {
        let _guard = self.guard()?;
        let value = self.read()?.flags.get(key.as_str()).copied().unwrap_or(0);
        debug!(value, "flag read");
        Ok(value)
    }

    #[instrument(skip(self, key), fields(path = %self.path.display(), flag = %key))]
    fn set(&self, key: &FlagKey, value: i64) -> Result<(), FlowError> {
        let _guard = self.guard()?;
        let mut file = self.read().unwrap_or_else(|err| {
            warn!(error = %err, "discarding unreadable flag file");
            FlagFile::default()
        });
        file.version = FORMAT_VERSION;
        file.flags.insert(key.as_str().to_owned(), value);
        self.write(&file)?;
        debug!(value, "flag written");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear_all(&self) -> Result<(), FlowError> {
        let _guard = self.guard()?;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("flag file removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FlowError::Store(format!(
                "failed to clear {}: {err}",
                self.path.display()
            ))),
        }
    }
}
