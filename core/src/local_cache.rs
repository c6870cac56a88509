//! Best-effort synchronous key/value slots on local disk.
//!
//! Writes never fail the caller: if the directory is missing, read-only or the
//! disk is full, the write is dropped. Reads treat any failure as "absent".

use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::Recipe;

/// Slot holding the mirror of the in-memory collection.
pub const SNAPSHOT_SLOT: &str = "cookbook_recipes_v2";

#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: Option<PathBuf>,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A cache with storage disabled: writes vanish, reads are always absent.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    fn slot_path(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{name}.json")))
    }

    pub fn set(&self, name: &str, value: &str) {
        let Some(path) = self.slot_path(name) else {
            return;
        };
        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&path, value));
        if let Err(e) = written {
            tracing::debug!(slot = name, error = %e, "local cache write dropped");
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let path = self.slot_path(name)?;
        std::fs::read_to_string(path).ok()
    }

    pub fn set_json<T: Serialize>(&self, name: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(text) => self.set(name, &text),
            Err(e) => tracing::debug!(slot = name, error = %e, "local cache value not serializable"),
        }
    }

    /// Malformed slot contents read as absent.
    pub fn get_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let text = self.get(name)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(slot = name, error = %e, "discarding malformed local cache slot");
                None
            }
        }
    }

    pub fn mirror_snapshot(&self, recipes: &[Recipe]) {
        self.set_json(SNAPSHOT_SLOT, &recipes);
    }

    pub fn read_snapshot(&self) -> Option<Vec<Recipe>> {
        self.get_json(SNAPSHOT_SLOT)
    }
}
