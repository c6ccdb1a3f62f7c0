//! `glimpse-agent` - in-process snapshot and logpoint debugging agent.
//!
//! The agent observes a running program without pausing it: operators
//! set capture points (one-shot stack/variable snapshots) and
//! logpoints (repeating formatted log lines) on source locations, and
//! the host invokes the agent's statement hook as execution passes
//! those locations. All agent failures are contained to breakpoint
//! status; the host program's control flow is never perturbed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Breakpoint wire specs, installed breakpoints, and breakpoint sets.
pub mod breakpoint;
/// Agent limits and configuration.
pub mod config;
/// Debuggee identity and registration.
pub mod debuggee;
/// Hit interception and cost governance.
pub mod engine;
/// Error taxonomy.
pub mod error;
/// Restricted expression language for conditions and log templates.
pub mod eval;
/// Statement-boundary hook installed into the host.
pub mod hook;
/// Structural program representation.
pub mod program;
/// Requested-location to statement resolution.
pub mod resolve;
/// Scope capture with bounded cost.
pub mod snapshot;
/// Breakpoint storage backends.
pub mod storage;
/// Shared breakpoint state, refresh, and outcome write-back.
pub mod store;

pub use breakpoint::{
    Breakpoint, BreakpointId, BreakpointKind, BreakpointSet, BreakpointSpec, BreakpointStatus,
    HitOutcome, LogLevel,
};
pub use config::AgentConfig;
pub use debuggee::Debuggee;
pub use engine::{CostGovernor, InterceptionEngine, LogSink, TracingSink};
pub use error::{EvalError, ResolveError, StorageError};
pub use hook::{NoopStatementHook, StatementHook};
pub use program::{FileId, ProgramIndex, ProgramIndexBuilder};
pub use resolve::{LocationResolver, ResolvedLocation};
pub use snapshot::{
    CapturedValue, FrameSnapshot, FrameView, LiveValue, ScopeAccess, ScopeSnapshot,
    SnapshotCollector,
};
pub use storage::{BreakpointStorage, FileBreakpointStorage, MemoryBreakpointStorage};
pub use store::BreakpointStore;
