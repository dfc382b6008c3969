// src/keywords.rs
// Durable, insertion-ordered set of search keywords. The external control
// surface adds/removes entries; the engine snapshots the set once per cycle.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::state::write_atomic;

/// A normalized search string: trimmed, inner whitespace collapsed.
/// Equality for dedup purposes is case-insensitive (Unicode lowercase, since
/// queries like "Grafikkarte" are not ASCII-only in general).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keyword(String);

impl Keyword {
    /// Normalize `raw` into a keyword. Returns `None` when nothing remains
    /// after trimming.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = normalize_keyword(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded form used as the dedup / registry partition key.
    pub fn folded(&self) -> String {
        self.0.to_lowercase()
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse whitespace and trim.
fn normalize_keyword(s: &str) -> String {
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(s.trim(), " ").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// File-backed keyword set. The on-disk form is line-delimited UTF-8, one
/// keyword per line in insertion order, so the external UI can read and edit
/// the same file. Every mutation rewrites the file atomically.
#[derive(Debug)]
pub struct KeywordStore {
    path: PathBuf,
    inner: Mutex<Vec<Keyword>>,
}

impl KeywordStore {
    /// Open the store at `path`. A missing file is an empty set. Blank lines
    /// are skipped; entries are normalized and case-insensitively deduped,
    /// first occurrence wins.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        let mut keywords: Vec<Keyword> = Vec::new();
        match fs::read_to_string(&path) {
            Ok(content) => {
                for line in content.lines() {
                    if let Some(kw) = Keyword::new(line) {
                        if !keywords.iter().any(|k| k.folded() == kw.folded()) {
                            keywords.push(kw);
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            path,
            inner: Mutex::new(keywords),
        })
    }

    pub fn add(&self, raw: &str) -> Result<AddOutcome, StateError> {
        let Some(kw) = Keyword::new(raw) else {
            return Ok(AddOutcome::AlreadyExists);
        };
        let mut v = self.inner.lock().expect("keyword store mutex poisoned");
        if v.iter().any(|k| k.folded() == kw.folded()) {
            return Ok(AddOutcome::AlreadyExists);
        }
        v.push(kw);
        self.persist(&v)?;
        Ok(AddOutcome::Added)
    }

    pub fn remove(&self, raw: &str) -> Result<RemoveOutcome, StateError> {
        let Some(kw) = Keyword::new(raw) else {
            return Ok(RemoveOutcome::NotFound);
        };
        let mut v = self.inner.lock().expect("keyword store mutex poisoned");
        let Some(pos) = v.iter().position(|k| k.folded() == kw.folded()) else {
            return Ok(RemoveOutcome::NotFound);
        };
        v.remove(pos);
        self.persist(&v)?;
        Ok(RemoveOutcome::Removed)
    }

    /// Owned snapshot in insertion order. A cycle works exclusively on the
    /// snapshot it took at its start; membership changes land on the next
    /// cycle boundary.
    pub fn list(&self) -> Vec<Keyword> {
        self.inner
            .lock()
            .expect("keyword store mutex poisoned")
            .clone()
    }

    fn persist(&self, keywords: &[Keyword]) -> Result<(), StateError> {
        let mut out = String::new();
        for kw in keywords {
            out.push_str(kw.as_str());
            out.push('\n');
        }
        write_atomic(&self.path, out.as_bytes())?;
        Ok(())
    }
}
