//! Expression evaluator for physical expressions.
//!
//! Expressions must be bound (see [`PhysicalExpr::bind`]) before they are
//! evaluated; evaluation itself is deterministic and side-effect free.

use kestrel_common::error::KestrelError;
use thiserror::Error;

use crate::expr::{BinaryOp, PhysicalExpr};
use crate::row::Row;
use crate::value::Value;

/// Error type for expression evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Column reference was never bound to a position.
    #[error("column '{0}' is not bound")]
    Unbound(String),
    /// Bound position is outside the row.
    #[error("column index {0} out of range")]
    ColumnNotFound(usize),
    /// Operand types do not support the operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer overflow.
    #[error("integer overflow in {0}")]
    Overflow(String),
    /// Cast error.
    #[error("cast error: {0}")]
    Cast(String),
}

impl From<EvalError> for KestrelError {
    fn from(e: EvalError) -> Self {
        KestrelError::evaluation(e.to_string())
    }
}

/// Evaluates a bound expression on a single row.
pub fn evaluate_expr(expr: &PhysicalExpr, row: &Row) -> Result<Value, EvalError> {
    match expr {
        PhysicalExpr::Column { name, index } => {
            let index = index.ok_or_else(|| EvalError::Unbound(name.clone()))?;
            row.get(index).cloned().ok_or(EvalError::ColumnNotFound(index))
        }

        PhysicalExpr::Literal(v) => Ok(v.clone()),

        PhysicalExpr::BinaryExpr { left, op, right } => {
            let left_val = evaluate_expr(left, row)?;
            let right_val = evaluate_expr(right, row)?;
            evaluate_binary_op(*op, &left_val, &right_val)
        }

        PhysicalExpr::Cast { expr, data_type } => {
            let val = evaluate_expr(expr, row)?;
            val.cast(data_type).map_err(EvalError::Cast)
        }
    }
}

/// Evaluates a binary operation.
fn evaluate_binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        // Three-valued logic
        BinaryOp::And => Ok(match (left.to_bool(), right.to_bool()) {
            (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
            (Some(true), Some(true)) => Value::Boolean(true),
            _ => Value::Null,
        }),
        BinaryOp::Or => Ok(match (left.to_bool(), right.to_bool()) {
            (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
            (Some(false), Some(false)) => Value::Boolean(false),
            _ => Value::Null,
        }),

        // NULL propagates through everything else
        _ if left.is_null() || right.is_null() => Ok(Value::Null),

        BinaryOp::Eq => Ok(Value::Boolean(left == right)),
        BinaryOp::NotEq => Ok(Value::Boolean(left != right)),
        BinaryOp::Lt => Ok(Value::Boolean(left < right)),
        BinaryOp::LtEq => Ok(Value::Boolean(left <= right)),
        BinaryOp::Gt => Ok(Value::Boolean(left > right)),
        BinaryOp::GtEq => Ok(Value::Boolean(left >= right)),

        BinaryOp::Plus => evaluate_arithmetic(op, left, right, i64::checked_add, |a, b| a + b),
        BinaryOp::Minus => evaluate_arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Multiply => evaluate_arithmetic(op, left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Divide | BinaryOp::Modulo if right.to_f64() == Some(0.0) => {
            Err(EvalError::DivisionByZero)
        }
        BinaryOp::Divide => evaluate_arithmetic(op, left, right, i64::checked_div, |a, b| a / b),
        BinaryOp::Modulo => evaluate_arithmetic(op, left, right, i64::checked_rem, |a, b| a % b),
    }
}

/// Evaluates arithmetic, staying integral unless an operand is floating.
fn evaluate_arithmetic<F, G>(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: F,
    float_op: G,
) -> Result<Value, EvalError>
where
    F: Fn(i64, i64) -> Option<i64>,
    G: Fn(f64, f64) -> f64,
{
    let mismatch = || EvalError::TypeMismatch(format!("{} {} {}", left, op, right));

    if left.is_floating() || right.is_floating() {
        let l = left.to_f64().ok_or_else(mismatch)?;
        let r = right.to_f64().ok_or_else(mismatch)?;
        return Ok(Value::Double(float_op(l, r)));
    }

    if !left.is_integral() || !right.is_integral() {
        return Err(mismatch());
    }
    let l = left.to_i64().ok_or_else(mismatch)?;
    let r = right.to_i64().ok_or_else(mismatch)?;
    int_op(l, r)
        .map(Value::BigInt)
        .ok_or_else(|| EvalError::Overflow(format!("{} {} {}", l, op, r)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn test_row() -> Row {
        Row::new(vec![Value::int(13), Value::int(130), Value::string("item13")])
    }

    #[test]
    fn test_evaluate_column() {
        let expr = PhysicalExpr::column("name_left", 2);
        assert_eq!(evaluate_expr(&expr, &test_row()).unwrap(), Value::string("item13"));
    }

    #[test]
    fn test_unbound_column() {
        let err = evaluate_expr(&PhysicalExpr::col("id_left"), &test_row()).unwrap_err();
        assert_eq!(err, EvalError::Unbound("id_left".to_string()));
    }

    #[test]
    fn test_column_out_of_range() {
        let err = evaluate_expr(&PhysicalExpr::column("x", 9), &test_row()).unwrap_err();
        assert_eq!(err, EvalError::ColumnNotFound(9));
    }

    #[test]
    fn test_integer_sum_stays_integral() {
        let expr = PhysicalExpr::plus(PhysicalExpr::column("id_left", 0), PhysicalExpr::column("cost_left", 1));
        assert_eq!(evaluate_expr(&expr, &test_row()).unwrap(), Value::BigInt(143));
    }

    #[test]
    fn test_float_promotion() {
        let expr = PhysicalExpr::plus(PhysicalExpr::column("id_left", 0), PhysicalExpr::lit(Value::double(0.5)));
        assert_eq!(evaluate_expr(&expr, &test_row()).unwrap(), Value::Double(13.5));
    }

    #[test]
    fn test_null_propagation() {
        let expr = PhysicalExpr::plus(PhysicalExpr::lit(Value::Null), PhysicalExpr::lit(Value::int(1)));
        assert_eq!(evaluate_expr(&expr, &Row::empty()).unwrap(), Value::Null);
    }

    #[test]
    fn test_division_by_zero() {
        let expr = PhysicalExpr::binary(PhysicalExpr::lit(Value::int(1)), BinaryOp::Divide, PhysicalExpr::lit(Value::int(0)));
        assert_eq!(evaluate_expr(&expr, &Row::empty()).unwrap_err(), EvalError::DivisionByZero);
    }

    #[test]
    fn test_overflow() {
        let expr = PhysicalExpr::plus(PhysicalExpr::lit(Value::bigint(i64::MAX)), PhysicalExpr::lit(Value::int(1)));
        assert!(matches!(evaluate_expr(&expr, &Row::empty()), Err(EvalError::Overflow(_))));
    }

    #[test]
    fn test_string_arithmetic_is_mismatch() {
        let expr = PhysicalExpr::plus(PhysicalExpr::column("name_left", 2), PhysicalExpr::lit(Value::int(1)));
        assert!(matches!(evaluate_expr(&expr, &test_row()), Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn test_comparison_and_logic() {
        let lt = PhysicalExpr::binary(PhysicalExpr::column("id_left", 0), BinaryOp::Lt, PhysicalExpr::lit(Value::int(20)));
        assert_eq!(evaluate_expr(&lt, &test_row()).unwrap(), Value::Boolean(true));

        let and = PhysicalExpr::binary(PhysicalExpr::lit(Value::Null), BinaryOp::And, PhysicalExpr::lit(Value::boolean(false)));
        assert_eq!(evaluate_expr(&and, &Row::empty()).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_cast() {
        let expr = PhysicalExpr::cast(PhysicalExpr::column("id_left", 0), DataType::Text);
        assert_eq!(evaluate_expr(&expr, &test_row()).unwrap(), Value::string("13"));
    }

    #[test]
    fn test_into_kestrel_error() {
        let err: KestrelError = EvalError::DivisionByZero.into();
        assert!(matches!(err, KestrelError::Evaluation { .. }));
    }
}
