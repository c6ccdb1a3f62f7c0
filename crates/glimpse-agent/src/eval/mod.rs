//! Restricted expression language for conditions and log templates.
//!
//! Side-effect free by construction: variable references, field and
//! index access, literals, comparisons, boolean and arithmetic
//! operators. There are no calls and no assignments, so evaluating an
//! operator-supplied expression can never perturb the host program.

mod ast;
mod eval;
mod parse;
pub(crate) mod template;
mod tokens;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use eval::{eval_condition, eval_expr};
pub use parse::parse_expression;
pub use template::{display_value, parse_template, render_template, LogFragment};
