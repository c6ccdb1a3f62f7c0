//! Debuggee identity and registration.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One running program instance under observation.
///
/// Registered once at agent startup and immutable for the process
/// lifetime. The id keys the externally persisted breakpoint set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debuggee {
    id: SmolStr,
    language: SmolStr,
    version: SmolStr,
    source_context: Option<SmolStr>,
}

impl Debuggee {
    /// Create a debuggee with an explicit identifier.
    #[must_use]
    pub fn new(
        id: impl Into<SmolStr>,
        language: impl Into<SmolStr>,
        version: impl Into<SmolStr>,
    ) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
            version: version.into(),
            source_context: None,
        }
    }

    /// Register a debuggee, deriving a stable id from its metadata.
    #[must_use]
    pub fn register(
        language: impl Into<SmolStr>,
        version: impl Into<SmolStr>,
        source_context: Option<SmolStr>,
    ) -> Self {
        let language = language.into();
        let version = version.into();
        let mut hasher = FxHasher::default();
        language.hash(&mut hasher);
        version.hash(&mut hasher);
        source_context.hash(&mut hasher);
        let id = SmolStr::new(format!("d-{:016x}", hasher.finish()));
        Self {
            id,
            language,
            version,
            source_context,
        }
    }

    /// Stable debuggee identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Language/runtime label of the observed program.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Version label of the observed program.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Optional source context (e.g. a VCS revision).
    #[must_use]
    pub fn source_context(&self) -> Option<&str> {
        self.source_context.as_deref()
    }
}
