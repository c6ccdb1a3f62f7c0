//! Structural program representation.
//!
//! The host registers the shape of its program once: files, namespace
//! blocks, functions, methods (with trait-contributed methods merged
//! into the composing class), closures, and nested statement blocks,
//! each with its source line range. Location resolution works against
//! this index only, never against raw text, so reachability of a line
//! is a structural question and fallthrough stays a runtime concern.

mod builder;

pub use builder::{BlockScope, ClassScope, ProgramIndexBuilder};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Identifier of a registered source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub(crate) u32);

/// Identifier of a statement in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId(pub(crate) u32);

/// Identifier of a block in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

/// Kind of a statement block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Top-level statements of a file.
    File,
    /// A bracketed namespace segment; locations are only valid within
    /// their own namespace's line range.
    Namespace,
    /// A named function body.
    Function,
    /// A class body (holds method blocks, no direct statements).
    Class,
    /// A method body.
    Method,
    /// A closure/anonymous function body (independent statement scope).
    Closure,
    /// A loop body.
    Loop,
    /// A conditional branch body.
    Branch,
    /// One arm of a switch statement.
    SwitchArm,
}

#[derive(Debug)]
pub(crate) struct BlockData {
    pub(crate) kind: BlockKind,
    pub(crate) file: FileId,
    pub(crate) parent: Option<BlockId>,
    pub(crate) depth: u32,
    pub(crate) name: Option<SmolStr>,
    pub(crate) first_line: u32,
    pub(crate) last_line: u32,
    pub(crate) statements: Vec<StatementId>,
}

#[derive(Debug)]
pub(crate) struct StatementData {
    pub(crate) file: FileId,
    pub(crate) block: BlockId,
    pub(crate) line: u32,
}

#[derive(Debug)]
pub(crate) struct FileData {
    pub(crate) path: SmolStr,
    pub(crate) blocks: Vec<BlockId>,
}

#[derive(Debug)]
pub(crate) struct ClassData {
    pub(crate) name: SmolStr,
    pub(crate) methods: Vec<(SmolStr, BlockId)>,
}

/// Immutable index of a program's structure.
///
/// Built once via [`ProgramIndexBuilder`] and shared for the process
/// lifetime; resolution results against it are cacheable.
#[derive(Debug)]
pub struct ProgramIndex {
    pub(crate) files: Vec<FileData>,
    pub(crate) by_path: FxHashMap<SmolStr, FileId>,
    pub(crate) blocks: Vec<BlockData>,
    pub(crate) statements: Vec<StatementData>,
    pub(crate) classes: Vec<ClassData>,
    pub(crate) class_by_name: FxHashMap<SmolStr, usize>,
}

impl ProgramIndex {
    /// Look up the id of a registered file path.
    #[must_use]
    pub fn file_id(&self, path: &str) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    /// Path of a registered file.
    #[must_use]
    pub fn file_path(&self, file: FileId) -> &str {
        &self.files[file.0 as usize].path
    }

    /// Number of registered files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Starting line of a statement.
    #[must_use]
    pub fn statement_line(&self, statement: StatementId) -> u32 {
        self.statements[statement.0 as usize].line
    }

    /// File containing a statement.
    #[must_use]
    pub fn statement_file(&self, statement: StatementId) -> FileId {
        self.statements[statement.0 as usize].file
    }

    /// Kind of the block directly containing a statement.
    #[must_use]
    pub fn statement_block_kind(&self, statement: StatementId) -> BlockKind {
        let block = self.statements[statement.0 as usize].block;
        self.blocks[block.0 as usize].kind
    }

    /// Name of the nearest enclosing named function or method.
    #[must_use]
    pub fn enclosing_function(&self, statement: StatementId) -> Option<&str> {
        let mut block = Some(self.statements[statement.0 as usize].block);
        while let Some(id) = block {
            let data = &self.blocks[id.0 as usize];
            if matches!(data.kind, BlockKind::Function | BlockKind::Method) {
                return data.name.as_deref();
            }
            block = data.parent;
        }
        None
    }

    /// Merged method names of a class, trait-contributed ones included.
    pub fn class_methods(&self, name: &str) -> Option<impl Iterator<Item = &str>> {
        let idx = self.class_by_name.get(name)?;
        Some(
            self.classes[*idx]
                .methods
                .iter()
                .map(|(method, _)| method.as_str()),
        )
    }

    /// Innermost block of `file` whose line range contains `line`.
    pub(crate) fn innermost_block_at(&self, file: FileId, line: u32) -> Option<BlockId> {
        let mut best: Option<BlockId> = None;
        for &block_id in &self.files[file.0 as usize].blocks {
            let block = &self.blocks[block_id.0 as usize];
            if line < block.first_line || line > block.last_line {
                continue;
            }
            match best {
                Some(current) if self.blocks[current.0 as usize].depth >= block.depth => {}
                _ => best = Some(block_id),
            }
        }
        best
    }

    /// First statement of `block` starting at or after `line`.
    pub(crate) fn first_statement_at_or_after(
        &self,
        block: BlockId,
        line: u32,
    ) -> Option<StatementId> {
        let statements = &self.blocks[block.0 as usize].statements;
        let idx = statements.partition_point(|&s| self.statements[s.0 as usize].line < line);
        statements.get(idx).copied()
    }
}
