//! Expression evaluation over a captured scope.

use crate::error::EvalError;
use crate::snapshot::{CapturedValue, ScopeSnapshot};

use super::ast::{BinaryOp, Expr, UnaryOp};

/// Evaluate an expression against the innermost frame of a snapshot.
pub fn eval_expr(snapshot: &ScopeSnapshot, expr: &Expr) -> Result<CapturedValue, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => snapshot
            .local(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
        Expr::Field { target, field } => match eval_expr(snapshot, target)? {
            CapturedValue::Map(fields) => fields
                .get(field.as_str())
                .cloned()
                .ok_or_else(|| EvalError::UndefinedField(field.clone())),
            CapturedValue::Truncated => Err(EvalError::Truncated),
            _ => Err(EvalError::TypeMismatch),
        },
        Expr::Index { target, index } => {
            let target = eval_expr(snapshot, target)?;
            let index = eval_expr(snapshot, index)?;
            match (target, index) {
                (CapturedValue::List(items), CapturedValue::Int(i)) => {
                    let idx = usize::try_from(i).map_err(|_| EvalError::IndexOutOfBounds {
                        index: i,
                        len: items.len(),
                    })?;
                    items
                        .get(idx)
                        .cloned()
                        .ok_or(EvalError::IndexOutOfBounds {
                            index: i,
                            len: items.len(),
                        })
                }
                (CapturedValue::Map(fields), CapturedValue::Str(key)) => fields
                    .get(key.as_str())
                    .cloned()
                    .ok_or_else(|| EvalError::UndefinedField(key.into())),
                (CapturedValue::Truncated, _) => Err(EvalError::Truncated),
                _ => Err(EvalError::TypeMismatch),
            }
        }
        Expr::Unary { op, expr } => {
            let value = eval_expr(snapshot, expr)?;
            match (op, value) {
                (UnaryOp::Not, CapturedValue::Bool(b)) => Ok(CapturedValue::Bool(!b)),
                (UnaryOp::Neg, CapturedValue::Int(i)) => Ok(CapturedValue::Int(i.wrapping_neg())),
                (UnaryOp::Neg, CapturedValue::Float(f)) => Ok(CapturedValue::Float(-f)),
                (_, CapturedValue::Truncated) => Err(EvalError::Truncated),
                _ => Err(EvalError::TypeMismatch),
            }
        }
        Expr::Binary { op, left, right } => eval_binary(snapshot, *op, left, right),
    }
}

/// Evaluate a breakpoint condition; the result must be a boolean.
pub fn eval_condition(snapshot: &ScopeSnapshot, expr: &Expr) -> Result<bool, EvalError> {
    match eval_expr(snapshot, expr)? {
        CapturedValue::Bool(b) => Ok(b),
        _ => Err(EvalError::ConditionNotBool),
    }
}

fn eval_binary(
    snapshot: &ScopeSnapshot,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
) -> Result<CapturedValue, EvalError> {
    // && and || short-circuit; everything else evaluates both sides.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let lhs = as_bool(eval_expr(snapshot, left)?)?;
        let result = match op {
            BinaryOp::And => lhs && as_bool(eval_expr(snapshot, right)?)?,
            _ => lhs || as_bool(eval_expr(snapshot, right)?)?,
        };
        return Ok(CapturedValue::Bool(result));
    }

    let lhs = eval_expr(snapshot, left)?;
    let rhs = eval_expr(snapshot, right)?;
    if matches!(lhs, CapturedValue::Truncated) || matches!(rhs, CapturedValue::Truncated) {
        return Err(EvalError::Truncated);
    }

    match op {
        BinaryOp::Eq => Ok(CapturedValue::Bool(loose_eq(&lhs, &rhs))),
        BinaryOp::Ne => Ok(CapturedValue::Bool(!loose_eq(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&lhs, &rhs)?;
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(CapturedValue::Bool(result))
        }
        BinaryOp::Add => match (lhs, rhs) {
            (CapturedValue::Str(a), CapturedValue::Str(b)) => Ok(CapturedValue::Str(a + &b)),
            (lhs, rhs) => arithmetic(op, lhs, rhs),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, lhs, rhs),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn as_bool(value: CapturedValue) -> Result<bool, EvalError> {
    match value {
        CapturedValue::Bool(b) => Ok(b),
        CapturedValue::Truncated => Err(EvalError::Truncated),
        _ => Err(EvalError::TypeMismatch),
    }
}

fn loose_eq(lhs: &CapturedValue, rhs: &CapturedValue) -> bool {
    match (lhs, rhs) {
        (CapturedValue::Int(a), CapturedValue::Float(b))
        | (CapturedValue::Float(b), CapturedValue::Int(a)) =>
        {
            #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
            {
                (*a as f64) == *b
            }
        }
        _ => lhs == rhs,
    }
}

fn compare(lhs: &CapturedValue, rhs: &CapturedValue) -> Result<std::cmp::Ordering, EvalError> {
    match (lhs, rhs) {
        (CapturedValue::Int(a), CapturedValue::Int(b)) => Ok(a.cmp(b)),
        (CapturedValue::Str(a), CapturedValue::Str(b)) => Ok(a.cmp(b)),
        (a, b) => {
            let a = as_f64(a)?;
            let b = as_f64(b)?;
            a.partial_cmp(&b).ok_or(EvalError::TypeMismatch)
        }
    }
}

fn as_f64(value: &CapturedValue) -> Result<f64, EvalError> {
    match value {
        #[allow(clippy::cast_precision_loss)]
        CapturedValue::Int(i) => Ok(*i as f64),
        CapturedValue::Float(f) => Ok(*f),
        _ => Err(EvalError::TypeMismatch),
    }
}

fn arithmetic(
    op: BinaryOp,
    lhs: CapturedValue,
    rhs: CapturedValue,
) -> Result<CapturedValue, EvalError> {
    if let (CapturedValue::Int(a), CapturedValue::Int(b)) = (&lhs, &rhs) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOp::Add => Ok(CapturedValue::Int(a.wrapping_add(b))),
            BinaryOp::Sub => Ok(CapturedValue::Int(a.wrapping_sub(b))),
            BinaryOp::Mul => Ok(CapturedValue::Int(a.wrapping_mul(b))),
            BinaryOp::Div => {
                if b == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(CapturedValue::Int(a.wrapping_div(b)))
                }
            }
            BinaryOp::Rem => {
                if b == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(CapturedValue::Int(a.wrapping_rem(b)))
                }
            }
            _ => Err(EvalError::TypeMismatch),
        };
    }
    let a = as_f64(&lhs)?;
    let b = as_f64(&rhs)?;
    match op {
        BinaryOp::Add => Ok(CapturedValue::Float(a + b)),
        BinaryOp::Sub => Ok(CapturedValue::Float(a - b)),
        BinaryOp::Mul => Ok(CapturedValue::Float(a * b)),
        BinaryOp::Div => Ok(CapturedValue::Float(a / b)),
        BinaryOp::Rem => Ok(CapturedValue::Float(a % b)),
        _ => Err(EvalError::TypeMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::parse_expression;
    use crate::snapshot::FrameSnapshot;
    use indexmap::IndexMap;
    use smol_str::SmolStr;

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
    fn evaluates_comparisons_and_access() {
        let snapshot = snapshot_with(&[
            ("count", CapturedValue::Int(3)),
            (
                "user",
                CapturedValue::Map(
                    [(SmolStr::new("name"), CapturedValue::Str("ada".into()))]
                        .into_iter()
                        .collect(),
                ),
            ),
        ]);
        let expr = parse_expression("count > 2 && user.name == 'ada'").unwrap();
        assert_eq!(
            eval_expr(&snapshot, &expr).unwrap(),
            CapturedValue::Bool(true)
        );
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let snapshot = snapshot_with(&[]);
        let expr = parse_expression("missing == 1").unwrap();
        assert_eq!(
            eval_expr(&snapshot, &expr),
            Err(EvalError::UndefinedVariable(SmolStr::new("missing")))
        );
    }

    #[test]
    fn non_bool_condition_is_rejected() {
        let snapshot = snapshot_with(&[("count", CapturedValue::Int(3))]);
        let expr = parse_expression("count").unwrap();
        assert_eq!(
            eval_condition(&snapshot, &expr),
            Err(EvalError::ConditionNotBool)
        );
    }

    #[test]
    fn negation_wraps_at_the_integer_edge() {
        let snapshot = snapshot_with(&[("count", CapturedValue::Int(i64::MIN))]);
        let expr = parse_expression("-count > 0").unwrap();
        // i64::MIN has no positive counterpart; negation wraps back to
        // itself instead of aborting the host statement.
        assert_eq!(
            eval_expr(&snapshot, &expr).unwrap(),
            CapturedValue::Bool(false)
        );
    }

    #[test]
    fn truncated_operands_do_not_compare() {
        let snapshot = snapshot_with(&[("blob", CapturedValue::Truncated)]);
        let expr = parse_expression("blob == 1").unwrap();
        assert_eq!(eval_expr(&snapshot, &expr), Err(EvalError::Truncated));
    }
}
