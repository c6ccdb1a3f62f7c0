//! Breakpoint storage backends.
//!
//! Storage is the external system of record for breakpoint specs and
//! their terminal outcomes. The agent only ever pulls from it on
//! refresh and pushes outcomes from the write-back worker; a
//! misbehaving backend degrades refresh, never the host program.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::breakpoint::{BreakpointSpec, HitOutcome};
use crate::error::StorageError;

/// External system of record for breakpoints.
pub trait BreakpointStorage: Send + Sync {
    /// Load the current breakpoint specs for a debuggee.
    ///
    /// Specs whose terminal outcome is already recorded are not
    /// returned again.
    fn load(&self, debuggee_id: &str) -> Result<Vec<BreakpointSpec>, StorageError>;

    /// Record the terminal outcome of one breakpoint.
    fn save(&self, debuggee_id: &str, outcome: &HitOutcome) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageDoc {
    #[serde(default)]
    debuggee_id: String,
    #[serde(default)]
    breakpoints: Vec<BreakpointSpec>,
    #[serde(default)]
    outcomes: Vec<HitOutcome>,
}

/// JSON-file backed storage.
///
/// The whole document is read on load and rewritten on save, which is
/// fine at breakpoint-list scale. A missing file reads as an empty
/// breakpoint list so a fresh debuggee starts clean.
#[derive(Debug)]
pub struct FileBreakpointStorage {
    path: PathBuf,
    // save() does read-modify-write on the document.
    write_lock: Mutex<()>,
}

impl FileBreakpointStorage {
    /// Storage over the JSON document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_doc(&self) -> Result<StorageDoc, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StorageDoc::default());
            }
            Err(err) => return Err(StorageError::Unavailable(err.to_string())),
        };
        serde_json::from_str(&raw).map_err(|err| StorageError::Corrupt(err.to_string()))
    }

    fn write_doc(&self, doc: &StorageDoc) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(doc)
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        fs::write(&self.path, raw).map_err(|err| StorageError::Unavailable(err.to_string()))
    }
}

impl BreakpointStorage for FileBreakpointStorage {
    fn load(&self, debuggee_id: &str) -> Result<Vec<BreakpointSpec>, StorageError> {
        let doc = self.read_doc()?;
        if !doc.debuggee_id.is_empty() && doc.debuggee_id != debuggee_id {
            return Ok(Vec::new());
        }
        let done: Vec<_> = doc.outcomes.iter().map(|o| &o.id).collect();
        Ok(doc
            .breakpoints
            .into_iter()
            .filter(|spec| !done.contains(&&spec.id))
            .collect())
    }

    fn save(&self, debuggee_id: &str, outcome: &HitOutcome) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().expect("storage write lock poisoned");
        let mut doc = self.read_doc()?;
        if doc.debuggee_id.is_empty() {
            doc.debuggee_id = debuggee_id.to_string();
        }
        doc.outcomes.retain(|o| o.id != outcome.id);
        doc.outcomes.push(outcome.clone());
        self.write_doc(&doc)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    specs: Vec<BreakpointSpec>,
    outcomes: Vec<HitOutcome>,
    fail_loads: usize,
    fail_saves: usize,
}

/// In-memory storage for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryBreakpointStorage {
    inner: Mutex<MemoryInner>,
}

impl MemoryBreakpointStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored breakpoint list.
    pub fn set_specs(&self, specs: Vec<BreakpointSpec>) {
        self.lock().specs = specs;
    }

    /// All outcomes recorded so far.
    #[must_use]
    pub fn outcomes(&self) -> Vec<HitOutcome> {
        self.lock().outcomes.clone()
    }

    /// Forget all recorded outcomes, as an operator deleting them
    /// would.
    pub fn clear_outcomes(&self) {
        self.lock().outcomes.clear();
    }

    /// Make the next `count` loads fail as unavailable.
    pub fn fail_next_loads(&self, count: usize) {
        self.lock().fail_loads = count;
    }

    /// Make the next `count` saves fail as unavailable.
    pub fn fail_next_saves(&self, count: usize) {
        self.lock().fail_saves = count;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().expect("memory storage poisoned")
    }
}

impl BreakpointStorage for MemoryBreakpointStorage {
    fn load(&self, _debuggee_id: &str) -> Result<Vec<BreakpointSpec>, StorageError> {
        let mut inner = self.lock();
        if inner.fail_loads > 0 {
            inner.fail_loads -= 1;
            return Err(StorageError::Unavailable("injected load failure".into()));
        }
        let done: Vec<_> = inner.outcomes.iter().map(|o| o.id.clone()).collect();
        Ok(inner
            .specs
            .iter()
            .filter(|spec| !done.contains(&spec.id))
            .cloned()
            .collect())
    }

    fn save(&self, _debuggee_id: &str, outcome: &HitOutcome) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_saves > 0 {
            inner.fail_saves -= 1;
            return Err(StorageError::Unavailable("injected save failure".into()));
        }
        inner.outcomes.retain(|o| o.id != outcome.id);
        inner.outcomes.push(outcome.clone());
        Ok(())
    }
}
