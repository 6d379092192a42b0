//! Persistence boundary: one named slot per collection.
//!
//! The store serializes each collection to JSON and hands it to a
//! [`SlotStore`]; it never touches the filesystem itself. The shipped
//! implementation keeps one `<slot>.json` file per collection under a data
//! directory. Swapping the port out (for tests, or another backend) changes
//! nothing above it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TrellisError;

/// Key-value boundary the entity store writes through after every mutation.
pub trait SlotStore {
    /// The slot's current payload, or `None` if it was never written.
    fn read(&self, slot: &str) -> Result<Option<String>, TrellisError>;

    /// Replace the slot's payload wholesale.
    fn write(&self, slot: &str, payload: &str) -> Result<(), TrellisError>;
}

/// File-backed slot store: `<dir>/<slot>.json`.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }
}

impl SlotStore for JsonDirStore {
    fn read(&self, slot: &str) -> Result<Option<String>, TrellisError> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn write(&self, slot: &str, payload: &str) -> Result<(), TrellisError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        write_atomically(&self.slot_path(slot), payload)
    }
}

// Write through a sibling temp file and rename, so a crash mid-write leaves
// the previous payload intact rather than a truncated slot.
fn write_atomically(path: &Path, payload: &str) -> Result<(), TrellisError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// In-memory slot store for tests and the built-in demo.
#[derive(Default)]
pub struct MemoryStore {
    slots: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemoryStore {
    fn read(&self, slot: &str) -> Result<Option<String>, TrellisError> {
        Ok(self.slots.borrow().get(slot).cloned())
    }

    fn write(&self, slot: &str, payload: &str) -> Result<(), TrellisError> {
        self.slots
            .borrow_mut()
            .insert(slot.to_string(), payload.to_string());
        Ok(())
    }
}
