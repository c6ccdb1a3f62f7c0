//! Breakpoint model.
//!
//! [`BreakpointSpec`] is the wire form pulled from storage. At
//! refresh the store resolves and compiles each spec into an installed
//! [`Breakpoint`], and publishes the whole generation as one immutable
//! [`BreakpointSet`]. Status transitions on installed breakpoints are
//! lock-free so concurrent hits race cleanly for the one-shot
//! outcomes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::eval::{parse_expression, parse_template, Expr, LogFragment};
use crate::error::EvalError;
use crate::program::FileId;
use crate::resolve::ResolvedLocation;
use crate::snapshot::ScopeSnapshot;

/// Opaque breakpoint identifier assigned by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointId(SmolStr);

impl BreakpointId {
    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BreakpointId {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

/// What a breakpoint does when execution reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakpointKind {
    /// Capture a snapshot once, then become fulfilled.
    #[serde(rename = "CAPTURE")]
    Capture,
    /// Emit a formatted log line on every hit.
    #[serde(rename = "LOG")]
    Log,
}

/// Severity attached to logpoint output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Informational.
    #[default]
    #[serde(rename = "INFO")]
    Info,
    /// Warning.
    #[serde(rename = "WARNING")]
    Warning,
    /// Error.
    #[serde(rename = "ERROR")]
    Error,
}

/// Lifecycle state of an installed breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakpointStatus {
    /// Waiting for a hit.
    #[serde(rename = "ACTIVE")]
    Active,
    /// One-shot capture completed.
    #[serde(rename = "FULFILLED")]
    Fulfilled,
    /// Failed permanently; see the recorded reason.
    #[serde(rename = "ERROR")]
    Error,
    /// Expired before completing.
    #[serde(rename = "EXPIRED")]
    Expired,
}

const STATUS_ACTIVE: u8 = 0;
const STATUS_FULFILLED: u8 = 1;
const STATUS_ERROR: u8 = 2;
const STATUS_EXPIRED: u8 = 3;

impl BreakpointStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            STATUS_FULFILLED => Self::Fulfilled,
            STATUS_ERROR => Self::Error,
            STATUS_EXPIRED => Self::Expired,
            _ => Self::Active,
        }
    }

    /// Whether the breakpoint will never fire again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::Active
    }
}

/// Wire form of a breakpoint as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointSpec {
    /// Backend-assigned identifier.
    pub id: BreakpointId,
    /// Requested source file path.
    pub file: SmolStr,
    /// Requested 1-based line.
    pub line: u32,
    /// Capture or log behavior.
    pub kind: BreakpointKind,
    /// Optional boolean gate evaluated on each hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Log message template; required for `LOG`, ignored for `CAPTURE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
    /// Severity of emitted log lines.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Unix-seconds deadline after which the breakpoint expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

/// An installed, compiled breakpoint.
///
/// Compilation (resolution, condition/template parsing) happens once
/// at install; the statement hook only ever touches precomputed data.
#[derive(Debug)]
pub struct Breakpoint {
    spec: BreakpointSpec,
    resolved: Option<ResolvedLocation>,
    condition: Option<Expr>,
    fragments: Vec<LogFragment>,
    needed_vars: FxHashSet<SmolStr>,
    status: AtomicU8,
    snapshot: OnceLock<ScopeSnapshot>,
    reason: OnceLock<String>,
}

impl Breakpoint {
    /// Compile a spec against its resolved location.
    ///
    /// Fails if the condition or log template does not parse; the
    /// caller records such specs via [`Breakpoint::failed`] instead of
    /// dropping them.
    pub fn compile(spec: BreakpointSpec, resolved: ResolvedLocation) -> Result<Self, EvalError> {
        let condition = spec
            .condition
            .as_deref()
            .map(parse_expression)
            .transpose()?;
        let fragments = match spec.kind {
            BreakpointKind::Log => {
                let format = spec
                    .log_format
                    .as_deref()
                    .ok_or_else(|| EvalError::Parse("logpoint without a log format".to_string()))?;
                parse_template(format)?
            }
            BreakpointKind::Capture => Vec::new(),
        };
        let mut needed_vars = FxHashSet::default();
        if let Some(expr) = &condition {
            expr.referenced_names(&mut needed_vars);
        }
        crate::eval::template::referenced_names(&fragments, &mut needed_vars);
        Ok(Self {
            spec,
            resolved: Some(resolved),
            condition,
            fragments,
            needed_vars,
            status: AtomicU8::new(STATUS_ACTIVE),
            snapshot: OnceLock::new(),
            reason: OnceLock::new(),
        })
    }

    /// Install a spec that already failed (resolution or compilation),
    /// carrying the failure reason for write-back.
    #[must_use]
    pub fn failed(spec: BreakpointSpec, reason: String) -> Self {
        let bp = Self::inert(spec, STATUS_ERROR);
        let _ = bp.reason.set(reason);
        bp
    }

    /// Install a spec whose deadline already passed.
    #[must_use]
    pub fn expired(spec: BreakpointSpec) -> Self {
        Self::inert(spec, STATUS_EXPIRED)
    }

    fn inert(spec: BreakpointSpec, status: u8) -> Self {
        Self {
            spec,
            resolved: None,
            condition: None,
            fragments: Vec::new(),
            needed_vars: FxHashSet::default(),
            status: AtomicU8::new(status),
            snapshot: OnceLock::new(),
            reason: OnceLock::new(),
        }
    }

    /// Backend identifier.
    #[must_use]
    pub fn id(&self) -> &BreakpointId {
        &self.spec.id
    }

    /// The wire spec this breakpoint was compiled from.
    #[must_use]
    pub fn spec(&self) -> &BreakpointSpec {
        &self.spec
    }

    /// Capture or log behavior.
    #[must_use]
    pub fn kind(&self) -> BreakpointKind {
        self.spec.kind
    }

    /// Resolved statement location, absent for inert breakpoints.
    #[must_use]
    pub fn resolved(&self) -> Option<ResolvedLocation> {
        self.resolved
    }

    /// Parsed condition, if one was set.
    #[must_use]
    pub fn condition(&self) -> Option<&Expr> {
        self.condition.as_ref()
    }

    /// Parsed log template fragments.
    #[must_use]
    pub fn fragments(&self) -> &[LogFragment] {
        &self.fragments
    }

    /// Variable names the condition and template read.
    #[must_use]
    pub fn needed_vars(&self) -> &FxHashSet<SmolStr> {
        &self.needed_vars
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> BreakpointStatus {
        BreakpointStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Snapshot captured by a fulfilled `CAPTURE` breakpoint.
    #[must_use]
    pub fn captured(&self) -> Option<&ScopeSnapshot> {
        self.snapshot.get()
    }

    /// Failure reason recorded when the status moved to error.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// Move active -> fulfilled, attaching the captured snapshot.
    ///
    /// Returns `false` if another thread already finished the
    /// breakpoint; exactly one caller ever wins.
    pub fn fulfill(&self, snapshot: ScopeSnapshot) -> bool {
        if self
            .status
            .compare_exchange(
                STATUS_ACTIVE,
                STATUS_FULFILLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }
        let _ = self.snapshot.set(snapshot);
        true
    }

    /// Move active -> error, attaching the failure reason.
    pub fn fail(&self, reason: String) -> bool {
        if self
            .status
            .compare_exchange(
                STATUS_ACTIVE,
                STATUS_ERROR,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }
        let _ = self.reason.set(reason);
        true
    }
}

/// One immutable generation of installed breakpoints.
///
/// The hot-path lookup is keyed by resolved (file, start line); a hit
/// walks only the breakpoints anchored at that statement, in the
/// order storage listed them.
#[derive(Debug, Default)]
pub struct BreakpointSet {
    generation: u64,
    breakpoints: Vec<std::sync::Arc<Breakpoint>>,
    by_location: FxHashMap<(FileId, u32), Vec<u32>>,
}

impl BreakpointSet {
    /// Build a set from installed breakpoints.
    #[must_use]
    pub fn new(generation: u64, breakpoints: Vec<std::sync::Arc<Breakpoint>>) -> Self {
        let mut by_location: FxHashMap<(FileId, u32), Vec<u32>> = FxHashMap::default();
        for (index, bp) in breakpoints.iter().enumerate() {
            if bp.status().is_terminal() {
                continue;
            }
            if let Some(loc) = bp.resolved() {
                by_location
                    .entry((loc.file, loc.line))
                    .or_default()
                    .push(u32::try_from(index).unwrap_or(u32::MAX));
            }
        }
        Self {
            generation,
            breakpoints,
            by_location,
        }
    }

    /// Monotonic refresh counter this set was published under.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of installed breakpoints, terminal ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Whether the set holds no breakpoints at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Whether any location in `file` is being watched.
    #[must_use]
    pub fn watches_file(&self, file: FileId) -> bool {
        self.by_location.keys().any(|(f, _)| *f == file)
    }

    /// Identifiers of breakpoints anchored in `file`.
    #[must_use]
    pub fn ids_for_file(&self, file: FileId) -> Vec<BreakpointId> {
        self.breakpoints
            .iter()
            .filter(|bp| bp.resolved().is_some_and(|loc| loc.file == file))
            .map(|bp| bp.id().clone())
            .collect()
    }

    /// Breakpoint by identifier.
    #[must_use]
    pub fn get(&self, id: &BreakpointId) -> Option<&std::sync::Arc<Breakpoint>> {
        self.breakpoints.iter().find(|bp| bp.id() == id)
    }

    /// All installed breakpoints in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &std::sync::Arc<Breakpoint>> {
        self.breakpoints.iter()
    }

    /// Breakpoints anchored at the statement starting at
    /// (`file`, `line`), in storage order.
    pub fn at(&self, file: FileId, line: u32) -> impl Iterator<Item = &std::sync::Arc<Breakpoint>> {
        self.by_location
            .get(&(file, line))
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&index| &self.breakpoints[index as usize])
    }
}

/// Terminal outcome of a breakpoint, written back to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitOutcome {
    /// Breakpoint this outcome belongs to.
    pub id: BreakpointId,
    /// Final status.
    pub status: BreakpointStatus,
    /// Captured snapshot for fulfilled captures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ScopeSnapshot>,
    /// Failure reason for errored breakpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HitOutcome {
    /// Build the write-back record for a breakpoint in a terminal
    /// state. Active breakpoints have no outcome yet.
    #[must_use]
    pub fn of(bp: &Breakpoint) -> Option<Self> {
        let status = bp.status();
        if !status.is_terminal() {
            return None;
        }
        Some(Self {
            id: bp.id().clone(),
            status,
            snapshot: bp.captured().cloned(),
            reason: bp.reason().map(str::to_string),
        })
    }
}
