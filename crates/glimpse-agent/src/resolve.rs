//! Location resolution.

use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::error::ResolveError;
use crate::program::{FileId, ProgramIndex, StatementId};

/// Canonical executable statement for a requested file/line.
///
/// Breakpoints are only ever matched against execution through their
/// resolved location, so requests pointing at blank lines, comments,
/// or declaration headers are normalized exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedLocation {
    /// File containing the statement.
    pub file: FileId,
    /// Starting line of the statement.
    pub line: u32,
    /// The statement itself.
    pub statement: StatementId,
}

/// Maps requested (file, line) pairs to executable statements.
///
/// Resolution is pure against an immutable [`ProgramIndex`], so
/// results (including failures) are memoized for the process
/// lifetime.
#[derive(Debug)]
pub struct LocationResolver {
    index: Arc<ProgramIndex>,
    memo: RwLock<FxHashMap<(FileId, u32), Result<ResolvedLocation, ResolveError>>>,
}

impl LocationResolver {
    /// Create a resolver over a program index.
    #[must_use]
    pub fn new(index: Arc<ProgramIndex>) -> Self {
        Self {
            index,
            memo: RwLock::new(FxHashMap::default()),
        }
    }

    /// The underlying program index.
    #[must_use]
    pub fn index(&self) -> &Arc<ProgramIndex> {
        &self.index
    }

    /// Resolve a requested file/line to the nearest executable
    /// statement starting at or after `line` within the innermost
    /// block enclosing that line.
    pub fn resolve(&self, path: &str, line: u32) -> Result<ResolvedLocation, ResolveError> {
        let Some(file) = self.index.file_id(path) else {
            return Err(ResolveError::UnknownFile(SmolStr::new(path)));
        };
        if let Some(cached) = self
            .memo
            .read()
            .expect("resolver memo poisoned")
            .get(&(file, line))
        {
            return cached.clone();
        }
        let result = self.resolve_uncached(file, path, line);
        self.memo
            .write()
            .expect("resolver memo poisoned")
            .insert((file, line), result.clone());
        result
    }

    fn resolve_uncached(
        &self,
        file: FileId,
        path: &str,
        line: u32,
    ) -> Result<ResolvedLocation, ResolveError> {
        let no_statement = || ResolveError::NoStatement {
            file: SmolStr::new(path),
            line,
        };
        let block = self
            .index
            .innermost_block_at(file, line)
            .ok_or_else(no_statement)?;
        let statement = self
            .index
            .first_statement_at_or_after(block, line)
            .ok_or_else(no_statement)?;
        Ok(ResolvedLocation {
            file,
            line: self.index.statement_line(statement),
            statement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramIndexBuilder;

    fn sample_index() -> Arc<ProgramIndex> {
        let mut builder = ProgramIndexBuilder::new();
        builder.file("web/index.php", 1..=50, |f| {
            f.statement(3);
            f.function("handler", 10..=30, |body| {
                body.statement(12);
                body.statement(20);
            });
            f.statement(40);
        });
        Arc::new(builder.finish())
    }

    #[test]
    fn blank_line_normalizes_to_next_statement() {
        let resolver = LocationResolver::new(sample_index());
        let resolved = resolver.resolve("web/index.php", 14).unwrap();
        assert_eq!(resolved.line, 20);
    }

    #[test]
    fn identical_requests_resolve_identically() {
        let resolver = LocationResolver::new(sample_index());
        let first = resolver.resolve("web/index.php", 11).unwrap();
        let second = resolver.resolve("web/index.php", 11).unwrap();
        let direct = resolver.resolve("web/index.php", 12).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.statement, direct.statement);
    }

    #[test]
    fn unknown_file_fails() {
        let resolver = LocationResolver::new(sample_index());
        assert!(matches!(
            resolver.resolve("missing.php", 1),
            Err(ResolveError::UnknownFile(_))
        ));
    }

    #[test]
    fn line_past_last_statement_in_block_fails() {
        let resolver = LocationResolver::new(sample_index());
        assert!(matches!(
            resolver.resolve("web/index.php", 25),
            Err(ResolveError::NoStatement { .. })
        ));
    }
}
