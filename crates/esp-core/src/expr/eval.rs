//! Expression evaluation against a scope of JSON bindings.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Number, Value};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::error::{ExprError, ExprResult};
use crate::capability::TaskService;
use crate::domain::{is_empty, json_type_name};

/// Name under which a task's service is reachable for method calls.
pub const SERVICE_VAR: &str = "service";

/// Variables visible to an expression, plus the optional service that
/// `service.method(...)` calls dispatch to.
#[derive(Default, Clone)]
pub struct Scope<'a> {
    vars: HashMap<&'a str, &'a Value>,
    service: Option<&'a dyn TaskService>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &'a str, value: &'a Value) -> Self {
        self.vars.insert(name, value);
        self
    }

    pub fn with_service(mut self, service: &'a dyn TaskService) -> Self {
        self.service = Some(service);
        self
    }

    fn lookup(&self, name: &str) -> ExprResult<Value> {
        self.vars
            .get(name)
            .map(|v| (*v).clone())
            .ok_or_else(|| ExprError::UnboundVariable(name.to_string()))
    }
}

/// Truthiness used by `and`, `or`, `not` and the ternary.
pub fn truthy(value: &Value) -> bool {
    !is_empty(value)
}

/// Evaluate `expr` in `scope`.
pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> ExprResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<ExprResult<Vec<_>>>()
            .map(Value::Array),
        Expr::Var(name) => scope.lookup(name),
        Expr::Member(target, name) => {
            let target = evaluate(target, scope)?;
            access(&target, &Value::String(name.clone()), ".")
        }
        Expr::Index(target, key) => {
            let target = evaluate(target, scope)?;
            let key = evaluate(key, scope)?;
            access(&target, &key, "[]")
        }
        Expr::Call {
            target,
            method,
            args,
        } => call(target.as_deref(), method, args, scope),
        Expr::Unary(op, operand) => {
            let value = evaluate(operand, scope)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                UnaryOp::Neg => negate(&value),
            }
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            if !truthy(&evaluate(lhs, scope)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&evaluate(rhs, scope)?)))
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            if truthy(&evaluate(lhs, scope)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&evaluate(rhs, scope)?)))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, scope)?;
            let rhs = evaluate(rhs, scope)?;
            binary(*op, &lhs, &rhs)
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if truthy(&evaluate(condition, scope)?) {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
    }
}

fn call(
    target: Option<&Expr>,
    method: &str,
    args: &[Expr],
    scope: &Scope<'_>,
) -> ExprResult<Value> {
    match target {
        None => Err(ExprError::UnknownFunction(method.to_string())),
        Some(Expr::Var(name)) if name == SERVICE_VAR => {
            let service = scope.service.ok_or_else(|| ExprError::NoService {
                method: method.to_string(),
            })?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<ExprResult<Vec<_>>>()?;
            service
                .call(method, &args)
                .map_err(|message| ExprError::Service {
                    method: method.to_string(),
                    message,
                })
        }
        Some(_) => Err(ExprError::NotCallable {
            method: method.to_string(),
        }),
    }
}

/// Member and index access. Missing keys and out-of-range indices yield null.
fn access(target: &Value, key: &Value, op: &str) -> ExprResult<Value> {
    match (target, key) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Object(map), Value::String(k)) => Ok(map.get(k).cloned().unwrap_or(Value::Null)),
        (Value::Object(map), Value::Number(n)) => {
            Ok(map.get(&n.to_string()).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(items), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null)),
        _ => Err(ExprError::InvalidOperand {
            op: op.to_string(),
            found: format!("{} with {} key", json_type_name(target), json_type_name(key)),
        }),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> ExprResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(lhs, rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(lhs, rhs).ok_or_else(|| invalid(op, lhs, rhs))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::In => match rhs {
            Value::Array(items) => Ok(Value::Bool(items.iter().any(|v| loose_eq(lhs, v)))),
            Value::Object(map) => match lhs {
                Value::String(k) => Ok(Value::Bool(map.contains_key(k))),
                Value::Number(n) => Ok(Value::Bool(map.contains_key(&n.to_string()))),
                _ => Err(invalid(op, lhs, rhs)),
            },
            _ => Err(invalid(op, lhs, rhs)),
        },
        BinaryOp::Concat => match (stringify(lhs), stringify(rhs)) {
            (Some(l), Some(r)) => Ok(Value::String(l + &r)),
            _ => Err(invalid(op, lhs, rhs)),
        },
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => truthy(lhs) && truthy(rhs),
            _ => truthy(lhs) || truthy(rhs),
        })),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> ExprResult<Value> {
    let (Value::Number(l), Value::Number(r)) = (lhs, rhs) else {
        return Err(invalid(op, lhs, rhs));
    };

    if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if b == 0 => return Err(ExprError::DivisionByZero),
            BinaryOp::Div if a.checked_rem(b) == Some(0) => a.checked_div(b),
            BinaryOp::Rem if b == 0 => return Err(ExprError::DivisionByZero),
            BinaryOp::Rem => a.checked_rem(b),
            _ => None,
        };
        if let Some(v) = exact {
            return Ok(Value::from(v));
        }
    }

    let (a, b) = match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(invalid(op, lhs, rhs)),
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(ExprError::DivisionByZero),
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    number_value(result)
}

fn negate(value: &Value) -> ExprResult<Value> {
    match value {
        Value::Number(n) => match n.as_i64().and_then(i64::checked_neg) {
            Some(v) => Ok(Value::from(v)),
            None => number_value(-n.as_f64().unwrap_or(f64::NAN)),
        },
        other => Err(ExprError::InvalidOperand {
            op: "-".to_string(),
            found: json_type_name(other).to_string(),
        }),
    }
}

/// Whole floats collapse to integers so `4 / 2` is `2`, not `2.0`.
fn number_value(v: f64) -> ExprResult<Value> {
    if !v.is_finite() {
        return Err(ExprError::NonFinite);
    }
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        return Ok(Value::from(v as i64));
    }
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or(ExprError::NonFinite)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Numbers compare numerically (numeric strings included), booleans by
/// truthiness, everything else structurally.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == truthy(other),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(lhs), as_number(rhs)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => as_number(lhs)?.partial_cmp(&as_number(rhs)?),
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn invalid(op: BinaryOp, lhs: &Value, rhs: &Value) -> ExprError {
    ExprError::InvalidOperand {
        op: op.symbol().to_string(),
        found: format!("{} and {}", json_type_name(lhs), json_type_name(rhs)),
    }
}
