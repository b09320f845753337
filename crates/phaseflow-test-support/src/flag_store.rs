//! Test flag stores: mock `FlagStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use phaseflow_core::error::FlowError;
use phaseflow_core::flag::{FlagKey, FlagStore};

/// An in-memory flag store that records every read, write and clear.
#[derive(Debug, Default)]
pub struct RecordingFlagStore {
    values: Mutex<HashMap<FlagKey, i64>>,
    reads: Mutex<Vec<FlagKey>>,
    writes: Mutex<Vec<(FlagKey, i64)>>,
    clears: Mutex<usize>,
}

impl RecordingFlagStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with values, as if written by a prior run.
    /// Seeding is not recorded as a write.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn seeded(values: &[(&str, i64)]) -> Self {
        let store = Self::new();
        {
            let mut map = store.values.lock().unwrap();
            for (key, value) in values {
                map.insert(FlagKey::new(*key), *value);
            }
        }
        store
    }

    /// Returns the current value of a key, `0` if absent.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn value(&self, key: &str) -> i64 {
        self.values
            .lock()
            .unwrap()
            .get(&FlagKey::new(key))
            .copied()
            .unwrap_or(0)
    }

    /// Returns every key read, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reads(&self) -> Vec<FlagKey> {
        self.reads.lock().unwrap().clone()
    }

    /// Returns every write, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn writes(&self) -> Vec<(FlagKey, i64)> {
        self.writes.lock().unwrap().clone()
    }

    /// Returns how many times `clear_all` was called.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear_count(&self) -> usize {
        *self.clears.lock().unwrap()
    }
}

impl FlagStore for RecordingFlagStore {
    fn get(&self, key: &FlagKey) -> Result<i64, FlowError> {
        self.reads.lock().unwrap().push(key.clone());
        Ok(self.values.lock().unwrap().get(key).copied().unwrap_or(0))
    }

    fn set(&self, key: &FlagKey, value: i64) -> Result<(), FlowError> {
        self.writes.lock().unwrap().push((key.clone(), value));
        self.values.lock().unwrap().insert(key.clone(), value);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), FlowError> {
        *self.clears.lock().unwrap() += 1;
        self.values.lock().unwrap().clear();
        Ok(())
    }
}

/// A flag store whose every operation fails. Useful for testing the
/// "unreadable store defaults to not done" path.
#[derive(Debug)]
pub struct FailingFlagStore;

impl FlagStore for FailingFlagStore {
    fn get(&self, _key: &FlagKey) -> Result<i64, FlowError> {
        Err(FlowError::Store("storage unavailable".into()))
    }

    fn set(&self, _key: &FlagKey, _value: i64) -> Result<(), FlowError> {
        Err(FlowError::Store("storage unavailable".into()))
    }

    fn clear_all(&self) -> Result<(), FlowError> {
        Err(FlowError::Store("storage unavailable".into()))
    }
}
