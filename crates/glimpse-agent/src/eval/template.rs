//! Log message templates.
//!
//! A template is literal text with `{expr}` placeholders; `{{` and
//! `}}` escape literal braces. Rendering fails as a whole if any
//! placeholder fails, so an erroring logpoint never emits a partial
//! line.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::error::EvalError;
use crate::snapshot::{CapturedValue, ScopeSnapshot};

use super::ast::Expr;
use super::eval::eval_expr;
use super::parse::parse_expression;

/// One fragment of a parsed log template.
#[derive(Debug, Clone, PartialEq)]
pub enum LogFragment {
    /// Literal text.
    Text(String),
    /// Expression placeholder.
    Expr {
        /// Placeholder source text, for error messages.
        source: String,
        /// Parsed expression.
        expr: Expr,
    },
}

/// Parse a log template into fragments.
pub fn parse_template(input: &str) -> Result<Vec<LogFragment>, EvalError> {
    let mut fragments = Vec::new();
    let mut text = String::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let mut source = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(inner) => source.push(inner),
                        None => {
                            return Err(EvalError::Parse(
                                "unclosed '{' in log template".to_string(),
                            ))
                        }
                    }
                }
                if !text.is_empty() {
                    fragments.push(LogFragment::Text(std::mem::take(&mut text)));
                }
                let expr = parse_expression(&source)?;
                fragments.push(LogFragment::Expr { source, expr });
            }
            other => text.push(other),
        }
    }
    if !text.is_empty() {
        fragments.push(LogFragment::Text(text));
    }
    Ok(fragments)
}

/// Render a template against a snapshot.
pub fn render_template(
    fragments: &[LogFragment],
    snapshot: &ScopeSnapshot,
) -> Result<String, EvalError> {
    let mut out = String::new();
    for fragment in fragments {
        match fragment {
            LogFragment::Text(text) => out.push_str(text),
            LogFragment::Expr { expr, .. } => {
                let value = eval_expr(snapshot, expr)?;
                out.push_str(&display_value(&value));
            }
        }
    }
    Ok(out)
}

/// Collect every variable name a set of fragments reads.
pub(crate) fn referenced_names(fragments: &[LogFragment], names: &mut FxHashSet<SmolStr>) {
    for fragment in fragments {
        if let LogFragment::Expr { expr, .. } = fragment {
            expr.referenced_names(names);
        }
    }
}

/// Format a captured value for log output.
#[must_use]
pub fn display_value(value: &CapturedValue) -> String {
    match value {
        CapturedValue::Null => "null".to_string(),
        CapturedValue::Bool(b) => b.to_string(),
        CapturedValue::Int(i) => i.to_string(),
        CapturedValue::Float(f) => f.to_string(),
        CapturedValue::Str(s) => s.clone(),
        CapturedValue::List(items) => {
            let parts: Vec<String> = items.iter().map(display_value).collect();
            format!("[{}]", parts.join(", "))
        }
        CapturedValue::Map(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{k}: {}", display_value(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        CapturedValue::Truncated => "<truncated>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FrameSnapshot;
    use indexmap::IndexMap;

    fn snapshot_with(locals: &[(&str, CapturedValue)]) -> ScopeSnapshot {
        let locals: IndexMap<SmolStr, CapturedValue> = locals
            .iter()
            .map(|(name, value)| (SmolStr::new(name), value.clone()))
            .collect();
        ScopeSnapshot {
            frames: vec![FrameSnapshot {
                function: None,
                file: SmolStr::new("app.php"),
                line: 1,
                locals,
            }],
            truncated: false,
        }
    }

    #[test]
    fn renders_placeholders_and_escapes() {
        let fragments = parse_template("user {{{name}}} has {count} items").unwrap();
        let snapshot = snapshot_with(&[
            ("name", CapturedValue::Str("ada".into())),
            ("count", CapturedValue::Int(3)),
        ]);
        assert_eq!(
            render_template(&fragments, &snapshot).unwrap(),
            "user {ada} has 3 items"
        );
    }

    #[test]
    fn undefined_variable_renders_nothing() {
        let fragments = parse_template("value is {missing}").unwrap();
        let snapshot = snapshot_with(&[]);
        assert_eq!(
            render_template(&fragments, &snapshot),
            Err(EvalError::UndefinedVariable(SmolStr::new("missing")))
        );
    }

    #[test]
    fn unclosed_placeholder_is_a_parse_error() {
        assert!(matches!(
            parse_template("broken {name"),
            Err(EvalError::Parse(_))
        ));
    }

    #[test]
    fn collects_referenced_names() {
        let fragments = parse_template("{user.name} of {count + extra}").unwrap();
        let mut names = FxHashSet::default();
        referenced_names(&fragments, &mut names);
        assert!(names.contains("user"));
        assert!(names.contains("count"));
        assert!(names.contains("extra"));
    }
}
