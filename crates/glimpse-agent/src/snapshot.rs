//! Scope capture.
//!
//! A [`ScopeSnapshot`] is a copy-out view of the call stack and local
//! variables at a hit, bounded by the agent's capture limits. Once
//! returned it owns all of its data and is never mutated.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use crate::config::AgentConfig;

/// A captured variable value: a closed, tagged variant set resolved
/// once at capture time. The evaluator operates only over these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CapturedValue {
    /// Absent/null value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(String),
    /// Ordered list of values.
    List(Vec<CapturedValue>),
    /// String-keyed composite value.
    Map(IndexMap<SmolStr, CapturedValue>),
    /// Marker for a value cut off by the capture limits.
    Truncated,
}

impl CapturedValue {
    /// Approximate captured size in bytes, used for budget accounting.
    #[must_use]
    pub fn approx_bytes(&self) -> usize {
        match self {
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Truncated => 8,
            Self::Str(s) => 8 + s.len(),
            Self::List(items) => 8 + items.iter().map(Self::approx_bytes).sum::<usize>(),
            Self::Map(fields) => {
                8 + fields
                    .iter()
                    .map(|(k, v)| k.len() + v.approx_bytes())
                    .sum::<usize>()
            }
        }
    }
}

/// A live local value as presented by the host at a statement
/// boundary. The collector copies it out; the agent never retains it.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveValue {
    /// Absent/null value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(String),
    /// Ordered list of values.
    List(Vec<LiveValue>),
    /// String-keyed composite value.
    Map(Vec<(SmolStr, LiveValue)>),
}

/// Position of one live call-stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameView {
    /// Enclosing function name, if any.
    pub function: Option<SmolStr>,
    /// Source file of the executing statement.
    pub file: SmolStr,
    /// Line of the executing statement.
    pub line: u32,
}

/// Host-provided view of the live call stack at a statement boundary.
///
/// Frame index 0 is the innermost frame.
pub trait ScopeAccess {
    /// Number of live frames.
    fn frame_count(&self) -> usize;

    /// Position of the frame at `index`.
    fn frame(&self, index: usize) -> Option<FrameView>;

    /// All local variables of the frame at `index`.
    fn locals(&self, index: usize) -> Vec<(SmolStr, LiveValue)>;

    /// One local variable of the frame at `index`, by name.
    fn local(&self, index: usize, name: &str) -> Option<LiveValue> {
        self.locals(index)
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
}

/// Captured state of one call-stack frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Enclosing function name, if any.
    pub function: Option<SmolStr>,
    /// Source file of the frame's executing statement.
    pub file: SmolStr,
    /// Line of the frame's executing statement.
    pub line: u32,
    /// Captured locals, in host order.
    pub locals: IndexMap<SmolStr, CapturedValue>,
}

/// Immutable capture of call stack and locals at a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    /// Captured frames, innermost first.
    pub frames: Vec<FrameSnapshot>,
    /// Whether any part of the capture was cut off by the limits.
    pub truncated: bool,
}

impl ScopeSnapshot {
    /// The innermost captured frame.
    #[must_use]
    pub fn top(&self) -> Option<&FrameSnapshot> {
        self.frames.first()
    }

    /// A local of the innermost frame, by name.
    #[must_use]
    pub fn local(&self, name: &str) -> Option<&CapturedValue> {
        self.top().and_then(|frame| frame.locals.get(name))
    }

    /// Approximate captured size in bytes.
    #[must_use]
    pub fn approx_bytes(&self) -> usize {
        self.frames
            .iter()
            .map(|frame| {
                frame
                    .locals
                    .iter()
                    .map(|(k, v)| k.len() + v.approx_bytes())
                    .sum::<usize>()
            })
            .sum()
    }
}

/// Builds bounded [`ScopeSnapshot`]s from live scope views.
#[derive(Debug, Clone)]
pub struct SnapshotCollector {
    max_variables: usize,
    max_depth: usize,
    max_frames: usize,
    max_snapshot_bytes: usize,
}

struct Budget {
    remaining: usize,
    truncated: bool,
}

impl SnapshotCollector {
    /// Create a collector with the configured capture limits.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            max_variables: config.max_variables,
            max_depth: config.max_depth,
            max_frames: config.max_frames,
            max_snapshot_bytes: config.max_snapshot_bytes,
        }
    }

    /// Capture every frame and all locals, within the limits.
    #[must_use]
    pub fn collect(&self, scope: &dyn ScopeAccess) -> ScopeSnapshot {
        let mut budget = Budget {
            remaining: self.max_snapshot_bytes,
            truncated: false,
        };
        let frame_count = scope.frame_count();
        let mut frames = Vec::with_capacity(frame_count.min(self.max_frames));
        for index in 0..frame_count {
            if index >= self.max_frames {
                budget.truncated = true;
                break;
            }
            let Some(view) = scope.frame(index) else {
                break;
            };
            let mut locals = IndexMap::new();
            for (name, value) in scope.locals(index) {
                if locals.len() >= self.max_variables {
                    budget.truncated = true;
                    break;
                }
                let captured = self.convert(&value, self.max_depth, &mut budget);
                locals.insert(name, captured);
            }
            frames.push(FrameSnapshot {
                function: view.function,
                file: view.file,
                line: view.line,
                locals,
            });
        }
        if budget.truncated {
            debug!(bytes = self.max_snapshot_bytes - budget.remaining, "snapshot truncated");
        }
        ScopeSnapshot {
            frames,
            truncated: budget.truncated,
        }
    }

    /// Capture only the innermost frame, restricted to the named
    /// variables. Used for logpoints to bound per-hit cost.
    #[must_use]
    pub fn collect_filtered(
        &self,
        scope: &dyn ScopeAccess,
        names: &FxHashSet<SmolStr>,
    ) -> ScopeSnapshot {
        let mut budget = Budget {
            remaining: self.max_snapshot_bytes,
            truncated: false,
        };
        let Some(view) = scope.frame(0) else {
            return ScopeSnapshot {
                frames: Vec::new(),
                truncated: false,
            };
        };
        let mut locals = IndexMap::new();
        for name in names {
            if let Some(value) = scope.local(0, name) {
                let captured = self.convert(&value, self.max_depth, &mut budget);
                locals.insert(name.clone(), captured);
            }
        }
        ScopeSnapshot {
            frames: vec![FrameSnapshot {
                function: view.function,
                file: view.file,
                line: view.line,
                locals,
            }],
            truncated: budget.truncated,
        }
    }

    fn convert(&self, value: &LiveValue, depth: usize, budget: &mut Budget) -> CapturedValue {
        let mut charge = |cost: usize, budget: &mut Budget| {
            if cost > budget.remaining {
                budget.remaining = 0;
                budget.truncated = true;
                false
            } else {
                budget.remaining -= cost;
                true
            }
        };
        match value {
            LiveValue::Null => CapturedValue::Null,
            LiveValue::Bool(b) => CapturedValue::Bool(*b),
            LiveValue::Int(i) => CapturedValue::Int(*i),
            LiveValue::Float(f) => CapturedValue::Float(*f),
            LiveValue::Str(s) => {
                if charge(8 + s.len(), budget) {
                    CapturedValue::Str(s.clone())
                } else {
                    CapturedValue::Truncated
                }
            }
            LiveValue::List(items) => {
                if depth == 0 || !charge(8, budget) {
                    budget.truncated = true;
                    return CapturedValue::Truncated;
                }
                CapturedValue::List(
                    items
                        .iter()
                        .map(|item| self.convert(item, depth - 1, budget))
                        .collect(),
                )
            }
            LiveValue::Map(fields) => {
                if depth == 0 || !charge(8, budget) {
                    budget.truncated = true;
                    return CapturedValue::Truncated;
                }
                CapturedValue::Map(
                    fields
                        .iter()
                        .map(|(key, item)| (key.clone(), self.convert(item, depth - 1, budget)))
                        .collect(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneFrame {
        locals: Vec<(SmolStr, LiveValue)>,
    }

    impl ScopeAccess for OneFrame {
        fn frame_count(&self) -> usize {
            1
        }

        fn frame(&self, index: usize) -> Option<FrameView> {
            (index == 0).then(|| FrameView {
                function: Some(SmolStr::new("handler")),
                file: SmolStr::new("web/index.php"),
                line: 34,
            })
        }

        fn locals(&self, index: usize) -> Vec<(SmolStr, LiveValue)> {
            if index == 0 {
                self.locals.clone()
            } else {
                Vec::new()
            }
        }
    }

    fn deep_list(depth: usize) -> LiveValue {
        let mut value = LiveValue::Int(1);
        for _ in 0..depth {
            value = LiveValue::List(vec![value]);
        }
        value
    }

    #[test]
    fn depth_limit_leaves_truncation_marker() {
        let config = AgentConfig {
            max_depth: 2,
            ..AgentConfig::default()
        };
        let collector = SnapshotCollector::new(&config);
        let scope = OneFrame {
            locals: vec![(SmolStr::new("nested"), deep_list(4))],
        };
        let snapshot = collector.collect(&scope);
        assert!(snapshot.truncated);
        let CapturedValue::List(outer) = snapshot.local("nested").unwrap() else {
            panic!("expected list");
        };
        let CapturedValue::List(inner) = &outer[0] else {
            panic!("expected list");
        };
        assert_eq!(inner[0], CapturedValue::Truncated);
    }

    #[test]
    fn byte_budget_truncates_large_strings() {
        let config = AgentConfig {
            max_snapshot_bytes: 32,
            ..AgentConfig::default()
        };
        let collector = SnapshotCollector::new(&config);
        let scope = OneFrame {
            locals: vec![
                (SmolStr::new("small"), LiveValue::Str("ok".into())),
                (SmolStr::new("big"), LiveValue::Str("x".repeat(128))),
            ],
        };
        let snapshot = collector.collect(&scope);
        assert!(snapshot.truncated);
        assert_eq!(
            snapshot.local("small"),
            Some(&CapturedValue::Str("ok".into()))
        );
        assert_eq!(snapshot.local("big"), Some(&CapturedValue::Truncated));
    }

    #[test]
    fn variable_count_limit_applies_per_frame() {
        let config = AgentConfig {
            max_variables: 1,
            ..AgentConfig::default()
        };
        let collector = SnapshotCollector::new(&config);
        let scope = OneFrame {
            locals: vec![
                (SmolStr::new("a"), LiveValue::Int(1)),
                (SmolStr::new("b"), LiveValue::Int(2)),
            ],
        };
        let snapshot = collector.collect(&scope);
        assert!(snapshot.truncated);
        assert_eq!(snapshot.top().unwrap().locals.len(), 1);
    }
}
