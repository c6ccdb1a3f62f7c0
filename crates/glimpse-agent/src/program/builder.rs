//! Builder for the structural program index.

use std::ops::RangeInclusive;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::warn;

use super::{
    BlockData, BlockId, BlockKind, ClassData, FileData, FileId, ProgramIndex, StatementData,
    StatementId,
};

#[derive(Debug, Default)]
struct Inner {
    files: Vec<FileData>,
    by_path: FxHashMap<SmolStr, FileId>,
    blocks: Vec<BlockData>,
    statements: Vec<StatementData>,
    classes: Vec<ClassData>,
    class_by_name: FxHashMap<SmolStr, usize>,
    traits: FxHashMap<SmolStr, Vec<(SmolStr, BlockId)>>,
    pending_uses: Vec<(usize, SmolStr)>,
}

impl Inner {
    fn new_block(
        &mut self,
        kind: BlockKind,
        file: FileId,
        parent: Option<BlockId>,
        name: Option<SmolStr>,
        lines: RangeInclusive<u32>,
    ) -> BlockId {
        let depth = parent.map_or(0, |p| self.blocks[p.0 as usize].depth + 1);
        let id = BlockId(u32::try_from(self.blocks.len()).unwrap_or(u32::MAX));
        self.blocks.push(BlockData {
            kind,
            file,
            parent,
            depth,
            name,
            first_line: *lines.start(),
            last_line: *lines.end(),
            statements: Vec::new(),
        });
        self.files[file.0 as usize].blocks.push(id);
        id
    }
}

/// Builder for a [`ProgramIndex`].
///
/// Trait methods are flattened into the composing class's merged
/// method list at [`finish`](Self::finish) time, so the resolver never
/// distinguishes trait-contributed statements from declared ones.
#[derive(Debug, Default)]
pub struct ProgramIndexBuilder {
    inner: Inner,
}

impl ProgramIndexBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file spanning `lines` and describe its
    /// top-level contents.
    pub fn file(
        &mut self,
        path: &str,
        lines: RangeInclusive<u32>,
        describe: impl FnOnce(&mut BlockScope<'_>),
    ) -> &mut Self {
        let path = SmolStr::new(path);
        let file = FileId(u32::try_from(self.inner.files.len()).unwrap_or(u32::MAX));
        self.inner.files.push(FileData {
            path: path.clone(),
            blocks: Vec::new(),
        });
        self.inner.by_path.insert(path, file);
        let root = self
            .inner
            .new_block(BlockKind::File, file, None, None, lines);
        let mut scope = BlockScope {
            inner: &mut self.inner,
            file,
            block: root,
        };
        describe(&mut scope);
        self
    }

    /// Finalize the index: merge trait methods into classes and sort
    /// statement lists for lookup.
    #[must_use]
    pub fn finish(mut self) -> ProgramIndex {
        let pending = std::mem::take(&mut self.inner.pending_uses);
        for (class_idx, trait_name) in pending {
            if let Some(methods) = self.inner.traits.get(&trait_name) {
                self.inner.classes[class_idx]
                    .methods
                    .extend(methods.iter().cloned());
            } else {
                warn!(trait_name = %trait_name, "unknown trait in class composition");
            }
        }
        let lines: Vec<u32> = self.inner.statements.iter().map(|s| s.line).collect();
        for block in &mut self.inner.blocks {
            block.statements.sort_by_key(|s| lines[s.0 as usize]);
        }
        ProgramIndex {
            files: self.inner.files,
            by_path: self.inner.by_path,
            blocks: self.inner.blocks,
            statements: self.inner.statements,
            classes: self.inner.classes,
            class_by_name: self.inner.class_by_name,
        }
    }
}

/// Scope handle for describing the contents of one block.
#[derive(Debug)]
pub struct BlockScope<'a> {
    inner: &'a mut Inner,
    file: FileId,
    block: BlockId,
}

impl BlockScope<'_> {
    /// Record an executable statement starting at `line`.
    pub fn statement(&mut self, line: u32) -> &mut Self {
        let id = StatementId(u32::try_from(self.inner.statements.len()).unwrap_or(u32::MAX));
        self.inner.statements.push(StatementData {
            file: self.file,
            block: self.block,
            line,
        });
        self.inner.blocks[self.block.0 as usize].statements.push(id);
        self
    }

    /// Describe a nested block of the given kind.
    pub fn block(
        &mut self,
        kind: BlockKind,
        lines: RangeInclusive<u32>,
        describe: impl FnOnce(&mut BlockScope<'_>),
    ) -> &mut Self {
        let id = self
            .inner
            .new_block(kind, self.file, Some(self.block), None, lines);
        let mut scope = BlockScope {
            inner: &mut *self.inner,
            file: self.file,
            block: id,
        };
        describe(&mut scope);
        self
    }

    /// Describe a named function body.
    pub fn function(
        &mut self,
        name: &str,
        lines: RangeInclusive<u32>,
        describe: impl FnOnce(&mut BlockScope<'_>),
    ) -> &mut Self {
        let id = self.inner.new_block(
            BlockKind::Function,
            self.file,
            Some(self.block),
            Some(SmolStr::new(name)),
            lines,
        );
        let mut scope = BlockScope {
            inner: &mut *self.inner,
            file: self.file,
            block: id,
        };
        describe(&mut scope);
        self
    }

    /// Describe a closure body; closures are independent statement
    /// scopes.
    pub fn closure(
        &mut self,
        lines: RangeInclusive<u32>,
        describe: impl FnOnce(&mut BlockScope<'_>),
    ) -> &mut Self {
        self.block(BlockKind::Closure, lines, describe)
    }

    /// Describe a bracketed namespace segment.
    pub fn namespace(
        &mut self,
        name: &str,
        lines: RangeInclusive<u32>,
        describe: impl FnOnce(&mut BlockScope<'_>),
    ) -> &mut Self {
        let id = self.inner.new_block(
            BlockKind::Namespace,
            self.file,
            Some(self.block),
            Some(SmolStr::new(name)),
            lines,
        );
        let mut scope = BlockScope {
            inner: &mut *self.inner,
            file: self.file,
            block: id,
        };
        describe(&mut scope);
        self
    }

    /// Describe a class body.
    pub fn class(
        &mut self,
        name: &str,
        lines: RangeInclusive<u32>,
        describe: impl FnOnce(&mut ClassScope<'_>),
    ) -> &mut Self {
        let name = SmolStr::new(name);
        let block = self.inner.new_block(
            BlockKind::Class,
            self.file,
            Some(self.block),
            Some(name.clone()),
            lines,
        );
        let class_idx = self.inner.classes.len();
        self.inner.classes.push(ClassData {
            name: name.clone(),
            methods: Vec::new(),
        });
        self.inner.class_by_name.insert(name, class_idx);
        let mut scope = ClassScope {
            inner: &mut *self.inner,
            file: self.file,
            block,
            target: MethodTarget::Class(class_idx),
        };
        describe(&mut scope);
        self
    }

    /// Describe a trait body; its methods are merged into classes that
    /// use the trait.
    pub fn trait_def(
        &mut self,
        name: &str,
        lines: RangeInclusive<u32>,
        describe: impl FnOnce(&mut ClassScope<'_>),
    ) -> &mut Self {
        let name = SmolStr::new(name);
        let block = self.inner.new_block(
            BlockKind::Class,
            self.file,
            Some(self.block),
            Some(name.clone()),
            lines,
        );
        self.inner.traits.insert(name.clone(), Vec::new());
        let mut scope = ClassScope {
            inner: &mut *self.inner,
            file: self.file,
            block,
            target: MethodTarget::Trait(name),
        };
        describe(&mut scope);
        self
    }
}

#[derive(Debug)]
enum MethodTarget {
    Class(usize),
    Trait(SmolStr),
}

/// Scope handle for describing a class or trait body.
#[derive(Debug)]
pub struct ClassScope<'a> {
    inner: &'a mut Inner,
    file: FileId,
    block: BlockId,
    target: MethodTarget,
}

impl ClassScope<'_> {
    /// Describe a method body.
    pub fn method(
        &mut self,
        name: &str,
        lines: RangeInclusive<u32>,
        describe: impl FnOnce(&mut BlockScope<'_>),
    ) -> &mut Self {
        let name = SmolStr::new(name);
        let id = self.inner.new_block(
            BlockKind::Method,
            self.file,
            Some(self.block),
            Some(name.clone()),
            lines,
        );
        match &self.target {
            MethodTarget::Class(idx) => self.inner.classes[*idx].methods.push((name, id)),
            MethodTarget::Trait(trait_name) => {
                if let Some(methods) = self.inner.traits.get_mut(trait_name) {
                    methods.push((name, id));
                }
            }
        }
        let mut scope = BlockScope {
            inner: &mut *self.inner,
            file: self.file,
            block: id,
        };
        describe(&mut scope);
        self
    }

    /// Merge a previously defined trait's methods into this class.
    pub fn use_trait(&mut self, name: &str) -> &mut Self {
        if let MethodTarget::Class(idx) = &self.target {
            self.inner.pending_uses.push((*idx, SmolStr::new(name)));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_methods_merge_into_class() {
        let mut builder = ProgramIndexBuilder::new();
        builder.file("lib/greeter.php", 1..=30, |f| {
            f.trait_def("Greets", 2..=8, |t| {
                t.method("greet", 3..=7, |m| {
                    m.statement(4);
                });
            });
            f.class("Controller", 10..=28, |c| {
                c.method("show", 12..=20, |m| {
                    m.statement(13);
                });
                c.use_trait("Greets");
            });
        });
        let index = builder.finish();

        let methods: Vec<&str> = index.class_methods("Controller").unwrap().collect();
        assert_eq!(methods, vec!["show", "greet"]);
    }
}
