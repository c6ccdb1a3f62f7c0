//! Expression nodes.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::snapshot::CapturedValue;

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(CapturedValue),
    /// Variable reference.
    Name(SmolStr),
    /// Field access on a composite value.
    Field {
        /// Accessed value.
        target: Box<Expr>,
        /// Field name.
        field: SmolStr,
    },
    /// Index access on a list or composite value.
    Index {
        /// Accessed value.
        target: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// Unary operator application.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        expr: Box<Expr>,
    },
    /// Binary operator application.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
    /// Numeric negation.
    Neg,
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

impl Expr {
    /// Collect every variable name the expression reads.
    pub fn referenced_names(&self, names: &mut FxHashSet<SmolStr>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Name(name) => {
                names.insert(name.clone());
            }
            Expr::Field { target, .. } | Expr::Unary { expr: target, .. } => {
                target.referenced_names(names);
            }
            Expr::Index { target, index } => {
                target.referenced_names(names);
                index.referenced_names(names);
            }
            Expr::Binary { left, right, .. } => {
                left.referenced_names(names);
                right.referenced_names(names);
            }
        }
    }
}
