//! Expression language: precedence, bindings and the call sandbox.

use esp_core::expr::{BinaryOp, Expr};
use esp_core::{ExprError, Expression, Scope, TaskService};
use serde_json::{json, Value};

fn eval(source: &str, scope: &Scope<'_>) -> Result<Value, ExprError> {
    Expression::parse(source)?.evaluate(scope)
}

#[test]
fn ternaries_nest_to_the_right() {
    let value = json!(15);
    let scope = Scope::new().bind("value", &value);
    let source = "value > 20 ? 3 : value > 10 ? 2 : value > 0 ? 1 : 0";
    assert_eq!(eval(source, &scope).unwrap(), json!(2));

    let parsed = Expression::parse(source).unwrap();
    assert!(matches!(parsed.ast(), Expr::Conditional { .. }));
    assert_eq!(parsed.to_string(), source);
}

#[test]
fn comparison_binds_looser_than_arithmetic() {
    let scope = Scope::new();
    assert_eq!(eval("1 + 2 == 3", &scope).unwrap(), json!(true));
    assert_eq!(eval("2 * 3 > 5 and 10 % 4 == 2", &scope).unwrap(), json!(true));
    assert_eq!(eval("(1 + 2) * 3", &scope).unwrap(), json!(9));

    match Expression::parse("a == b or c").unwrap().ast() {
        Expr::Binary(BinaryOp::Or, lhs, _) => {
            assert!(matches!(**lhs, Expr::Binary(BinaryOp::Eq, _, _)))
        }
        other => panic!("unexpected tree: {other:?}"),
    }
}

#[test]
fn unbound_variables_are_rejected() {
    let scope = Scope::new();
    assert_eq!(
        eval("value + 1", &scope),
        Err(ExprError::UnboundVariable("value".to_string()))
    );
}

#[test]
fn free_function_calls_are_rejected() {
    let value = json!("abc");
    let scope = Scope::new().bind("value", &value);
    assert_eq!(
        eval("strlen(value)", &scope),
        Err(ExprError::UnknownFunction("strlen".to_string()))
    );
    assert!(matches!(
        eval("value.length()", &scope),
        Err(ExprError::NotCallable { .. })
    ));
}

#[test]
fn host_syntax_is_not_an_escape_hatch() {
    let scope = Scope::new();
    for source in ["$value", "value;", "`ls`", "{1: 2}", "a = 1"] {
        assert!(
            matches!(Expression::parse(source), Err(ExprError::Syntax(_))),
            "{source:?} must not parse"
        );
    }
    assert!(eval("", &scope).is_err());
}

struct Counter;

impl TaskService for Counter {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, String> {
        match method {
            "count" => Ok(json!(args.len())),
            _ => Err(format!("unsupported method {method}")),
        }
    }
}

#[test]
fn service_methods_receive_evaluated_arguments() {
    let key = json!("counter");
    let props = json!({"tags": ["a", "b"]});
    let scope = Scope::new()
        .bind("service", &key)
        .bind("properties", &props)
        .with_service(&Counter);

    assert_eq!(
        eval("service.count(properties.tags[0], 1 + 1, null)", &scope).unwrap(),
        json!(3)
    );
    assert_eq!(eval("service ~ '!'", &scope).unwrap(), json!("counter!"));
    assert!(matches!(
        eval("service.explode()", &scope),
        Err(ExprError::Service { .. })
    ));
}
