//! Agent limits and configuration.

use std::time::Duration;

/// Cost and size ceilings for debugger work inside the host process.
///
/// The per-hit ceiling protects a single request from a slow capture;
/// the cumulative budgets cap total debugger overhead for the process
/// window, after which further hits no-op.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum local variables captured per frame.
    pub max_variables: usize,
    /// Maximum nesting depth captured for composite values.
    pub max_depth: usize,
    /// Maximum call-stack frames captured per snapshot.
    pub max_frames: usize,
    /// Maximum approximate bytes captured per snapshot.
    pub max_snapshot_bytes: usize,
    /// Per-hit ceiling on snapshot/evaluation work, in microseconds.
    pub max_hit_micros: u64,
    /// Cumulative debugger time budget, in microseconds.
    pub total_budget_micros: u64,
    /// Cumulative captured-bytes budget.
    pub total_budget_bytes: u64,
    /// Minimum interval between storage pulls for `maybe_refresh`.
    pub refresh_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_variables: 256,
            max_depth: 5,
            max_frames: 16,
            max_snapshot_bytes: 64 * 1024,
            max_hit_micros: 5_000,
            total_budget_micros: 10_000,
            total_budget_bytes: 10 * 1024 * 1024,
            refresh_interval: Duration::from_secs(30),
        }
    }
}
