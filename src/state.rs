// src/state.rs
// The single persistence component behind the engine's durable state: the
// per-keyword seen map plus the latest cycle status, stored as one JSON
// document. Both the engine and the external dashboard read this file; all
// engine writes go through `StateFile` and land via atomic replace.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::status::CycleStatus;

/// folded keyword -> listing id -> notified-at timestamp
pub type SeenMap = BTreeMap<String, BTreeMap<String, DateTime<Utc>>>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateDoc {
    #[serde(default)]
    pub seen: SeenMap,
    #[serde(default)]
    pub last_cycle: Option<CycleStatus>,
}

/// Write `bytes` to `path` via a sibling temp file and rename, so a crash
/// mid-write can never leave a half-written document behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    doc: Mutex<StateDoc>,
}

impl StateFile {
    /// Load the document at `path`. A missing file is an empty document; a
    /// file that exists but fails to parse is `StateError::Corrupt` and the
    /// engine must not guess past it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<StateDoc>(&content)
                .map_err(|e| StateError::Corrupt(e.to_string()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => StateDoc::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Read access without cloning the whole document.
    pub fn read<T>(&self, f: impl FnOnce(&StateDoc) -> T) -> T {
        let doc = self.doc.lock().expect("state mutex poisoned");
        f(&doc)
    }

    /// Apply `f` under the lock, then persist the whole document atomically.
    /// The mutation is visible to readers even if the persist fails; callers
    /// treat a persist failure as fatal for the running cycle.
    pub fn update<T>(&self, f: impl FnOnce(&mut StateDoc) -> T) -> Result<T, StateError> {
        let mut doc = self.doc.lock().expect("state mutex poisoned");
        let out = f(&mut doc);
        self.persist(&doc)?;
        Ok(out)
    }

    pub fn snapshot(&self) -> StateDoc {
        self.doc.lock().expect("state mutex poisoned").clone()
    }

    fn persist(&self, doc: &StateDoc) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| StateError::Corrupt(e.to_string()))?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}
