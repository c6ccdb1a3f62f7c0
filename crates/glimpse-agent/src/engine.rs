//! Hit interception.
//!
//! The [`InterceptionEngine`] is the statement hook wired into the
//! host. It matches the published breakpoint set, gates on
//! conditions, captures snapshots, emits log lines, and charges every
//! hit against the cost governor so debugger overhead stays bounded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::breakpoint::{Breakpoint, BreakpointKind, LogLevel};
use crate::config::AgentConfig;
use crate::eval::{eval_condition, render_template};
use crate::hook::StatementHook;
use crate::program::FileId;
use crate::snapshot::{ScopeAccess, SnapshotCollector};
use crate::store::BreakpointStore;

/// Destination for logpoint output.
pub trait LogSink: Send + Sync {
    /// Emit one fully rendered log line.
    fn emit(&self, level: LogLevel, message: &str, file: &str, line: u32);
}

/// Sink that forwards logpoint output to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, level: LogLevel, message: &str, file: &str, line: u32) {
        match level {
            LogLevel::Info => tracing::info!(file, line, "{message}"),
            LogLevel::Warning => tracing::warn!(file, line, "{message}"),
            LogLevel::Error => tracing::error!(file, line, "{message}"),
        }
    }
}

/// Cumulative spend accounting for debugger work in this process.
///
/// Once either budget is exhausted every later hit is a no-op; the
/// host program keeps running undisturbed.
#[derive(Debug)]
pub struct CostGovernor {
    spent_micros: AtomicU64,
    captured_bytes: AtomicU64,
    budget_micros: u64,
    budget_bytes: u64,
}

impl CostGovernor {
    /// Governor with the configured cumulative budgets.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            spent_micros: AtomicU64::new(0),
            captured_bytes: AtomicU64::new(0),
            budget_micros: config.total_budget_micros,
            budget_bytes: config.total_budget_bytes,
        }
    }

    /// Whether either budget has run out.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.spent_micros.load(Ordering::Relaxed) >= self.budget_micros
            || self.captured_bytes.load(Ordering::Relaxed) >= self.budget_bytes
    }

    /// Total debugger time spent so far, in microseconds.
    #[must_use]
    pub fn spent_micros(&self) -> u64 {
        self.spent_micros.load(Ordering::Relaxed)
    }

    /// Total bytes captured so far.
    #[must_use]
    pub fn captured_bytes(&self) -> u64 {
        self.captured_bytes.load(Ordering::Relaxed)
    }

    fn charge_micros(&self, micros: u64) {
        self.spent_micros.fetch_add(micros, Ordering::Relaxed);
    }

    fn charge_bytes(&self, bytes: u64) {
        self.captured_bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// Statement hook that services the published breakpoint set.
pub struct InterceptionEngine {
    store: BreakpointStore,
    collector: SnapshotCollector,
    sink: Arc<dyn LogSink>,
    governor: CostGovernor,
    max_hit_micros: u64,
}

impl InterceptionEngine {
    /// Engine over a store, emitting logpoint output to `sink`.
    #[must_use]
    pub fn new(store: BreakpointStore, config: &AgentConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            store,
            collector: SnapshotCollector::new(config),
            sink,
            governor: CostGovernor::new(config),
            max_hit_micros: config.max_hit_micros,
        }
    }

    /// Cumulative spend accounting.
    #[must_use]
    pub fn governor(&self) -> &CostGovernor {
        &self.governor
    }

    /// The store this engine serves.
    #[must_use]
    pub fn store(&self) -> &BreakpointStore {
        &self.store
    }

    fn capture_hit(&self, bp: &Breakpoint, scope: &dyn ScopeAccess, started: Instant) {
        let snapshot = self.collector.collect(scope);
        if let Some(expr) = bp.condition() {
            match eval_condition(&snapshot, expr) {
                Ok(true) => {}
                Ok(false) => return,
                Err(err) => {
                    if bp.fail(err.to_string()) {
                        self.store.record_hit(bp);
                    }
                    return;
                }
            }
        }
        if self.ceiling_exceeded(started) {
            self.abort_slow_hit(bp);
            return;
        }
        self.governor
            .charge_bytes(u64::try_from(snapshot.approx_bytes()).unwrap_or(u64::MAX));
        if bp.fulfill(snapshot) {
            self.store.record_hit(bp);
            debug!(breakpoint = %bp.id(), "snapshot captured");
        }
    }

    fn log_hit(&self, bp: &Breakpoint, scope: &dyn ScopeAccess, started: Instant) {
        let snapshot = self.collector.collect_filtered(scope, bp.needed_vars());
        if let Some(expr) = bp.condition() {
            match eval_condition(&snapshot, expr) {
                Ok(true) => {}
                Ok(false) => return,
                Err(err) => {
                    if bp.fail(err.to_string()) {
                        self.store.record_hit(bp);
                    }
                    return;
                }
            }
        }
        match render_template(bp.fragments(), &snapshot) {
            Ok(message) => {
                if self.ceiling_exceeded(started) {
                    self.abort_slow_hit(bp);
                    return;
                }
                let spec = bp.spec();
                let line = bp.resolved().map_or(spec.line, |loc| loc.line);
                self.sink.emit(spec.log_level, &message, &spec.file, line);
            }
            Err(err) => {
                // No partial line is ever emitted for a failed render.
                if bp.fail(err.to_string()) {
                    self.store.record_hit(bp);
                }
            }
        }
    }

    // The ceiling covers one breakpoint's own work, measured from the
    // start of its dispatch, and is checked before the observable
    // effect. A breakpoint that already captured or emitted is never
    // failed after the fact, and a slow neighbor at the same location
    // cannot push another breakpoint over the limit.
    fn ceiling_exceeded(&self, started: Instant) -> bool {
        u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX) > self.max_hit_micros
    }

    fn abort_slow_hit(&self, bp: &Breakpoint) {
        if bp.fail("hit exceeded the per-hit time ceiling".to_string()) {
            self.store.record_hit(bp);
        }
    }
}

impl StatementHook for InterceptionEngine {
    fn on_statement(&self, file: FileId, line: u32, scope: &dyn ScopeAccess) {
        let set = self.store.current();
        let matches: Vec<_> = set.at(file, line).collect();
        if matches.is_empty() {
            return;
        }
        if self.governor.exhausted() {
            return;
        }
        let started = Instant::now();
        for bp in matches {
            if bp.status().is_terminal() {
                continue;
            }
            let hit_started = Instant::now();
            match bp.kind() {
                BreakpointKind::Capture => self.capture_hit(bp, scope, hit_started),
                BreakpointKind::Log => self.log_hit(bp, scope, hit_started),
            }
        }
        let elapsed = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.governor.charge_micros(elapsed);
    }
}
