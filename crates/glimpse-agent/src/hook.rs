//! Statement-boundary hook.

use crate::program::FileId;
use crate::snapshot::ScopeAccess;

/// Called by the host before each executable statement.
///
/// Implementations must be cheap when nothing is watched at the
/// location; the host invokes this on every statement of instrumented
/// files.
pub trait StatementHook: Send + Sync {
    /// Observe execution reaching the statement starting at
    /// (`file`, `line`).
    fn on_statement(&self, file: FileId, line: u32, scope: &dyn ScopeAccess);
}

/// Hook that ignores every statement. Hosts install this when
/// debugging is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatementHook;

impl StatementHook for NoopStatementHook {
    fn on_statement(&self, _file: FileId, _line: u32, _scope: &dyn ScopeAccess) {}
}
