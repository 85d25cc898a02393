//! Tree-walking interpreter for parsed expressions.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::parser::{BinaryOp, Expr, UnaryOp};
use super::ExprError;
use crate::item::{stringify, Data};

/// Evaluates `expr` against `env`.
///
/// # Errors
///
/// Returns [`ExprError::UnknownVariable`] for unbound identifiers and
/// [`ExprError::Type`]/[`ExprError::Eval`] for operand mismatches, division
/// by zero and bad builtin calls.
pub fn evaluate(expr: &Expr, env: &Data) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UnknownVariable { name: name.clone() }),
        Expr::Member(target, field) => member(&evaluate(target, env)?, field),
        Expr::Index(target, index) => {
            let target = evaluate(target, env)?;
            let index = evaluate(index, env)?;
            index_value(&target, &index)
        }
        Expr::Unary(op, operand) => unary(*op, evaluate(operand, env)?),
        Expr::Binary(BinaryOp::And, a, b) => {
            if as_bool(&evaluate(a, env)?, "&&")? {
                Ok(Value::Bool(as_bool(&evaluate(b, env)?, "&&")?))
            } else {
                Ok(Value::Bool(false))
            }
        }
        Expr::Binary(BinaryOp::Or, a, b) => {
            if as_bool(&evaluate(a, env)?, "||")? {
                Ok(Value::Bool(true))
            } else {
                Ok(Value::Bool(as_bool(&evaluate(b, env)?, "||")?))
            }
        }
        Expr::Binary(BinaryOp::Coalesce, a, b) => {
            let left = evaluate(a, env)?;
            if left.is_null() {
                evaluate(b, env)
            } else {
                Ok(left)
            }
        }
        Expr::Binary(op, a, b) => binary(*op, &evaluate(a, env)?, &evaluate(b, env)?),
        Expr::Ternary(cond, then, otherwise) => {
            if as_bool(&evaluate(cond, env)?, "?:")? {
                evaluate(then, env)
            } else {
                evaluate(otherwise, env)
            }
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|a| evaluate(a, env))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &args)
        }
        Expr::Array(items) => items
            .iter()
            .map(|a| evaluate(a, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

fn type_error(message: String) -> ExprError {
    ExprError::Type { message }
}

fn as_bool(v: &Value, op: &str) -> Result<bool, ExprError> {
    v.as_bool().ok_or_else(|| {
        type_error(format!("operator {op} expects bool, got {}", type_name(v)))
    })
}

fn member(target: &Value, field: &str) -> Result<Value, ExprError> {
    match target {
        Value::Object(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(type_error(format!(
            "cannot access field '{field}' on {}",
            type_name(other)
        ))),
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value, ExprError> {
    match (target, index) {
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(items), Value::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| type_error("array index must be an integer".to_string()))?;
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let resolved = if i < 0 { len + i } else { i };
            usize::try_from(resolved)
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned()
                .ok_or_else(|| ExprError::Eval {
                    message: format!("index {i} out of range (len {len})"),
                })
        }
        (Value::Null, _) => Ok(Value::Null),
        (t, i) => Err(type_error(format!(
            "cannot index {} with {}",
            type_name(t),
            type_name(i)
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(v: &Value) -> Option<Self> {
        let Value::Number(n) = v else {
            return None;
        };
        match n.as_i64() {
            Some(i) => Some(Self::Int(i)),
            None => n.as_f64().map(Self::Float),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

fn float_value(f: f64) -> Result<Value, ExprError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ExprError::Eval {
            message: format!("result {f} is not a finite number"),
        })
}

fn unary(op: UnaryOp, v: Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!as_bool(&v, "!")?)),
        UnaryOp::Neg => match Num::of(&v) {
            Some(Num::Int(i)) => match i.checked_neg() {
                Some(n) => Ok(Value::from(n)),
                None => float_value(-Num::Int(i).as_f64()),
            },
            Some(Num::Float(f)) => float_value(-f),
            None => Err(type_error(format!("cannot negate {}", type_name(&v)))),
        },
    }
}

fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(a, b))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(a, b))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = order(a, b)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::Add if a.is_string() || b.is_string() => {
            Ok(Value::String(format!("{}{}", stringify(a), stringify(b))))
        }
        BinaryOp::Add if a.is_array() && b.is_array() => {
            let mut out = a.as_array().cloned().unwrap_or_default();
            out.extend(b.as_array().cloned().unwrap_or_default());
            Ok(Value::Array(out))
        }
        _ => arithmetic(op, a, b),
    }
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ExprError> {
    let (Some(x), Some(y)) = (Num::of(a), Num::of(b)) else {
        return Err(type_error(format!(
            "invalid operation: {} {op:?} {}",
            type_name(a),
            type_name(b)
        )));
    };

    if let (Num::Int(i), Num::Int(j)) = (x, y) {
        let exact = match op {
            BinaryOp::Add => i.checked_add(j),
            BinaryOp::Sub => i.checked_sub(j),
            BinaryOp::Mul => i.checked_mul(j),
            BinaryOp::Div | BinaryOp::Rem if j == 0 => {
                return Err(ExprError::Eval {
                    message: "division by zero".to_string(),
                })
            }
            BinaryOp::Div if i.checked_rem(j) == Some(0) => i.checked_div(j),
            BinaryOp::Rem => i.checked_rem(j),
            _ => None,
        };
        if let Some(n) = exact {
            return Ok(Value::from(n));
        }
    }

    let (fx, fy) = (x.as_f64(), y.as_f64());
    match op {
        BinaryOp::Add => float_value(fx + fy),
        BinaryOp::Sub => float_value(fx - fy),
        BinaryOp::Mul => float_value(fx * fy),
        BinaryOp::Div if fy == 0.0 => Err(ExprError::Eval {
            message: "division by zero".to_string(),
        }),
        BinaryOp::Div => float_value(fx / fy),
        BinaryOp::Rem => Err(type_error(
            "operator % expects integer operands".to_string(),
        )),
        other => Err(ExprError::Eval {
            message: format!("unsupported arithmetic operator {other:?}"),
        }),
    }
}

/// Equality with numeric normalization (`1 == 1.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (Num::of(a), Num::of(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
        (Some(x), Some(y)) => (x.as_f64() - y.as_f64()).abs() < f64::EPSILON,
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Result<Ordering, ExprError> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => match (Num::of(a), Num::of(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(x.cmp(&y)),
            (Some(x), Some(y)) => Ok(x.as_f64().total_cmp(&y.as_f64())),
            _ => Err(type_error(format!(
                "cannot compare {} with {}",
                type_name(a),
                type_name(b)
            ))),
        },
    }
}

/// Names accepted by [`call`].
pub const BUILTINS: [&str; 13] = [
    "len", "string", "int", "float", "abs", "min", "max", "upper", "lower", "trim", "contains",
    "now", "uuid",
];

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), ExprError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ExprError::Eval {
            message: format!(
                "{name}() takes {expected} argument(s), got {}",
                args.len()
            ),
        })
    }
}

fn string_arg<'a>(name: &str, v: &'a Value) -> Result<&'a str, ExprError> {
    v.as_str()
        .ok_or_else(|| type_error(format!("{name}() expects string, got {}", type_name(v))))
}

#[allow(clippy::cast_possible_truncation)]
fn call(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match name {
        "len" => {
            arity(name, args, 1)?;
            let n = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(m) => m.len(),
                other => {
                    return Err(type_error(format!(
                        "len() expects string, array or map, got {}",
                        type_name(other)
                    )))
                }
            };
            Ok(Value::from(n))
        }
        "string" => {
            arity(name, args, 1)?;
            Ok(Value::String(stringify(&args[0])))
        }
        "int" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| s.trim().parse::<f64>().map(|f| Value::from(f.trunc() as i64)))
                    .map_err(|_| ExprError::Eval {
                        message: format!("int(): cannot parse '{s}'"),
                    }),
                Value::Bool(b) => Ok(Value::from(i64::from(*b))),
                v => match Num::of(v) {
                    Some(Num::Int(i)) => Ok(Value::from(i)),
                    Some(Num::Float(f)) => Ok(Value::from(f.trunc() as i64)),
                    None => Err(type_error(format!("int() cannot convert {}", type_name(v)))),
                },
            }
        }
        "float" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::String(s) => s.trim().parse::<f64>().map_err(|_| ExprError::Eval {
                    message: format!("float(): cannot parse '{s}'"),
                })
                .and_then(float_value),
                v => match Num::of(v) {
                    Some(n) => float_value(n.as_f64()),
                    None => Err(type_error(format!("float() cannot convert {}", type_name(v)))),
                },
            }
        }
        "abs" => {
            arity(name, args, 1)?;
            match Num::of(&args[0]) {
                Some(Num::Int(i)) => i
                    .checked_abs()
                    .map(Value::from)
                    .map_or_else(|| float_value(Num::Int(i).as_f64().abs()), Ok),
                Some(Num::Float(f)) => float_value(f.abs()),
                None => Err(type_error(format!(
                    "abs() expects number, got {}",
                    type_name(&args[0])
                ))),
            }
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(ExprError::Eval {
                    message: format!("{name}() takes at least 1 argument"),
                });
            }
            let want = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best = &args[0];
            for candidate in &args[1..] {
                if order(candidate, best)? == want {
                    best = candidate;
                }
            }
            Ok(best.clone())
        }
        "upper" => {
            arity(name, args, 1)?;
            Ok(Value::String(string_arg(name, &args[0])?.to_uppercase()))
        }
        "lower" => {
            arity(name, args, 1)?;
            Ok(Value::String(string_arg(name, &args[0])?.to_lowercase()))
        }
        "trim" => {
            arity(name, args, 1)?;
            Ok(Value::String(string_arg(name, &args[0])?.trim().to_string()))
        }
        "contains" => {
            arity(name, args, 2)?;
            match &args[0] {
                Value::String(s) => Ok(Value::Bool(s.contains(string_arg(name, &args[1])?))),
                Value::Array(items) => {
                    Ok(Value::Bool(items.iter().any(|v| values_equal(v, &args[1]))))
                }
                Value::Object(map) => Ok(Value::Bool(
                    map.contains_key(string_arg(name, &args[1])?),
                )),
                other => Err(type_error(format!(
                    "contains() expects string, array or map, got {}",
                    type_name(other)
                ))),
            }
        }
        "now" => {
            arity(name, args, 0)?;
            Ok(Value::String(crate::item::format_time(chrono::Utc::now())))
        }
        "uuid" => {
            arity(name, args, 0)?;
            Ok(Value::String(uuid::Uuid::new_v4().to_string()))
        }
        _ => Err(ExprError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}
