//! Results registry.
//!
//! The registry maps each job name to the job's output and the reserved
//! `inputs` key to the run's inputs. Every key is written once: a job's unit
//! stores its output after all of its dispatches completed, and nothing else
//! writes to it.

use std::sync::RwLock;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("result for \"{key}\" was already recorded")]
  AlreadyRecorded { key: String },

  #[error("results registry lock poisoned: {message}")]
  Poisoned { message: String },
}

/// Outputs of a run, keyed by job name.
#[derive(Debug)]
pub struct ResultsRegistry {
  entries: RwLock<Map<String, Value>>,
}

impl ResultsRegistry {
  /// A registry holding only the run's inputs.
  pub fn new(inputs: Value) -> Self {
    let mut entries = Map::new();
    entries.insert("inputs".to_string(), inputs);
    Self {
      entries: RwLock::new(entries),
    }
  }

  /// Record `key`'s output. Fails if `key` already has one.
  pub fn insert(&self, key: &str, value: Value) -> Result<(), RegistryError> {
    let mut entries = self.entries.write().map_err(|e| RegistryError::Poisoned {
      message: e.to_string(),
    })?;
    if entries.contains_key(key) {
      return Err(RegistryError::AlreadyRecorded {
        key: key.to_string(),
      });
    }
    entries.insert(key.to_string(), value);
    Ok(())
  }

  /// Run `f` against the current entries.
  ///
  /// The read lock is held only for the duration of `f`.
  pub fn read<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> Result<R, RegistryError> {
    let entries = self.entries.read().map_err(|e| RegistryError::Poisoned {
      message: e.to_string(),
    })?;
    Ok(f(&entries))
  }

  /// Copy of all entries as a JSON object.
  pub fn snapshot(&self) -> Result<Value, RegistryError> {
    self.read(|entries| Value::Object(entries.clone()))
  }
}
