//! Persisted one-time flags.
//!
//! A [`FlagStore`] is the durable key/integer store that survives process
//! restarts. Nodes never talk to it directly: they go through a
//! [`FlagCache`], which reads each key at most once per process and turns
//! unreadable or corrupt values into "not done".

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::FlowError;

/// Key of a persisted flag, e.g. the preference name of a legal document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagKey(String);

impl FlagKey {
    /// Creates a flag key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlagKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Value written when a flag's condition is satisfied.
pub const FLAG_DONE: i64 = 1;

/// Durable key/integer store. `0` (or an absent key) means "not done".
pub trait FlagStore: Send + Sync {
    /// Reads a flag value, returning `0` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Store` if the backing storage cannot be read.
    fn get(&self, key: &FlagKey) -> Result<i64, FlowError>;

    /// Writes a flag value.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Store` if the backing storage cannot be written.
    fn set(&self, key: &FlagKey, value: i64) -> Result<(), FlowError>;

    /// Removes every flag ("reset progress").
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Store` if the backing storage cannot be written.
    fn clear_all(&self) -> Result<(), FlowError>;
}

/// Read-through cache in front of a [`FlagStore`].
pub struct FlagCache {
    store: Arc<dyn FlagStore>,
    cached: HashMap<FlagKey, i64>,
}

impl fmt::Debug for FlagCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagCache")
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

impl FlagCache {
    /// Wraps a store with an empty cache.
    #[must_use]
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self {
            store,
            cached: HashMap::new(),
        }
    }

    /// Returns the flag value, reading the store only on the first call for
    /// `key`. Read failures and negative values are treated as `0`.
    pub fn value(&mut self, key: &FlagKey) -> i64 {
        if let Some(value) = self.cached.get(key) {
            return *value;
        }

        let value = match self.store.get(key) {
            Ok(value) if value >= 0 => value,
            Ok(corrupt) => {
                warn!(flag = %key, value = corrupt, "corrupt flag value, treating as not done");
                0
            }
            Err(err) => {
                warn!(flag = %key, error = %err, "flag read failed, treating as not done");
                0
            }
        };
        debug!(flag = %key, value, "flag loaded");
        self.cached.insert(key.clone(), value);
        value
    }

    /// Returns `true` if the flag has been satisfied in this or a prior run.
    pub fn is_done(&mut self, key: &FlagKey) -> bool {
        self.value(key) > 0
    }

    /// Records the flag as done. The cache is updated even if the store
    /// write fails, so the rest of this process treats the flag as done.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Store` if the durable write failed.
    #[instrument(skip(self), fields(flag = %key))]
    pub fn mark_done(&mut self, key: &FlagKey) -> Result<(), FlowError> {
        self.cached.insert(key.clone(), FLAG_DONE);
        self.store.set(key, FLAG_DONE)
    }

    /// Clears every persisted flag and forgets all cached values.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Store` if the store could not be cleared. The
    /// cache is emptied regardless, so the next read goes to the store.
    pub fn reset(&mut self) -> Result<(), FlowError> {
        self.cached.clear();
        self.store.clear_all()
    }
}
