//! Expression parser using a pest PEG grammar + Pratt parser.
//!
//! Parses rule and task expressions such as:
//! - `"value > 3 ? 2 : 0"`
//! - `"relationships['customer']['tier'] == 'gold' and value >= 100"`
//! - `"service.send(properties['email'], tasks['score'] * 2)"`

use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use serde_json::{Number, Value};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::error::{ExprError, ExprResult};

// ---------------------------------------------------------------------------
// Pest parser (generated from expr.pest grammar)
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[grammar = "src/expr/expr.pest"]
struct ExprParser;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse an expression string into a syntax tree.
pub fn parse_expression(input: &str) -> ExprResult<Expr> {
    let pairs = ExprParser::parse(Rule::expression, input)?;

    let pratt = PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::eq_op, Assoc::Left)
            | Op::infix(Rule::ne_op, Assoc::Left)
            | Op::infix(Rule::lt_op, Assoc::Left)
            | Op::infix(Rule::le_op, Assoc::Left)
            | Op::infix(Rule::gt_op, Assoc::Left)
            | Op::infix(Rule::ge_op, Assoc::Left)
            | Op::infix(Rule::in_op, Assoc::Left))
        .op(Op::infix(Rule::add_op, Assoc::Left)
            | Op::infix(Rule::sub_op, Assoc::Left)
            | Op::infix(Rule::concat_op, Assoc::Left))
        .op(Op::infix(Rule::mul_op, Assoc::Left)
            | Op::infix(Rule::div_op, Assoc::Left)
            | Op::infix(Rule::rem_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op) | Op::prefix(Rule::neg_op))
        .op(Op::postfix(Rule::member) | Op::postfix(Rule::index) | Op::postfix(Rule::call));

    // expression = { SOI ~ ternary ~ EOI }
    let ternary = pairs
        .flat_map(|p| p.into_inner())
        .find(|p| p.as_rule() == Rule::ternary)
        .ok_or_else(|| ExprError::Syntax("empty expression".to_string()))?;

    parse_ternary(ternary, &pratt)
}

// ---------------------------------------------------------------------------
// Internal parsing helpers
// ---------------------------------------------------------------------------

fn parse_ternary(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> ExprResult<Expr> {
    let mut inner = pair.into_inner();
    let condition = match inner.next() {
        Some(binary) => parse_binary(binary, pratt)?,
        None => return Err(ExprError::Syntax("missing operand".to_string())),
    };

    match (inner.next(), inner.next()) {
        (Some(then), Some(otherwise)) => Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(parse_ternary(then, pratt)?),
            otherwise: Box::new(parse_ternary(otherwise, pratt)?),
        }),
        _ => Ok(condition),
    }
}

fn parse_binary(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> ExprResult<Expr> {
    pratt
        .map_primary(|primary| parse_primary(primary, pratt))
        .map_prefix(|op, rhs| {
            let op = match op.as_rule() {
                Rule::not_op => UnaryOp::Not,
                Rule::neg_op => UnaryOp::Neg,
                other => return Err(unexpected(other)),
            };
            Ok(Expr::Unary(op, Box::new(rhs?)))
        })
        .map_postfix(|lhs, op| parse_postfix(lhs?, op, pratt))
        .map_infix(|lhs, op, rhs| {
            let op = binary_op(op.as_rule())?;
            Ok(Expr::Binary(op, Box::new(lhs?), Box::new(rhs?)))
        })
        .parse(pair.into_inner())
}

fn parse_primary(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> ExprResult<Expr> {
    match pair.as_rule() {
        Rule::null => Ok(Expr::Literal(Value::Null)),
        Rule::boolean => Ok(Expr::Literal(Value::Bool(pair.as_str() == "true"))),
        Rule::number => parse_number(pair.as_str()).map(Expr::Literal),
        Rule::string => {
            let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Expr::Literal(Value::String(unescape(raw))))
        }
        Rule::array => pair
            .into_inner()
            .map(|item| parse_ternary(item, pratt))
            .collect::<ExprResult<Vec<_>>>()
            .map(Expr::Array),
        Rule::ident => Ok(Expr::Var(pair.as_str().to_string())),
        Rule::ternary => parse_ternary(pair, pratt),
        other => Err(unexpected(other)),
    }
}

fn parse_postfix(lhs: Expr, op: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> ExprResult<Expr> {
    match op.as_rule() {
        Rule::member => {
            let name = op
                .into_inner()
                .next()
                .map(|p| p.as_str().to_string())
                .ok_or_else(|| ExprError::Syntax("member access without a name".to_string()))?;
            Ok(Expr::Member(Box::new(lhs), name))
        }
        Rule::index => {
            let key = op
                .into_inner()
                .next()
                .ok_or_else(|| ExprError::Syntax("empty index".to_string()))?;
            Ok(Expr::Index(Box::new(lhs), Box::new(parse_ternary(key, pratt)?)))
        }
        Rule::call => {
            let args = op
                .into_inner()
                .map(|arg| parse_ternary(arg, pratt))
                .collect::<ExprResult<Vec<_>>>()?;
            match lhs {
                Expr::Member(target, method) => Ok(Expr::Call {
                    target: Some(target),
                    method,
                    args,
                }),
                Expr::Var(method) => Ok(Expr::Call {
                    target: None,
                    method,
                    args,
                }),
                _ => Err(ExprError::Syntax(
                    "only named methods can be called".to_string(),
                )),
            }
        }
        other => Err(unexpected(other)),
    }
}

fn binary_op(rule: Rule) -> ExprResult<BinaryOp> {
    Ok(match rule {
        Rule::or_op => BinaryOp::Or,
        Rule::and_op => BinaryOp::And,
        Rule::eq_op => BinaryOp::Eq,
        Rule::ne_op => BinaryOp::Ne,
        Rule::lt_op => BinaryOp::Lt,
        Rule::le_op => BinaryOp::Le,
        Rule::gt_op => BinaryOp::Gt,
        Rule::ge_op => BinaryOp::Ge,
        Rule::in_op => BinaryOp::In,
        Rule::add_op => BinaryOp::Add,
        Rule::sub_op => BinaryOp::Sub,
        Rule::concat_op => BinaryOp::Concat,
        Rule::mul_op => BinaryOp::Mul,
        Rule::div_op => BinaryOp::Div,
        Rule::rem_op => BinaryOp::Rem,
        other => return Err(unexpected(other)),
    })
}

fn parse_number(text: &str) -> ExprResult<Value> {
    if !text.contains('.') {
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::from(int));
        }
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ExprError::Syntax(format!("invalid number '{text}'")))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn unexpected(rule: Rule) -> ExprError {
    ExprError::Syntax(format!("unexpected rule {rule:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_string()))
    }

    fn lit(v: Value) -> Box<Expr> {
        Box::new(Expr::Literal(v))
    }

    #[test]
    fn test_ternary_over_comparison() {
        let expr = parse_expression("value > 3 ? 2 : 0").unwrap();
        assert_eq!(
            expr,
            Expr::Conditional {
                condition: Box::new(Expr::Binary(BinaryOp::Gt, var("value"), lit(json!(3)))),
                then: lit(json!(2)),
                otherwise: lit(json!(0)),
            }
        );
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                lit(json!(1)),
                Box::new(Expr::Binary(BinaryOp::Mul, lit(json!(2)), lit(json!(3)))),
            )
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse_expression("a or b and c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Or,
                var("a"),
                Box::new(Expr::Binary(BinaryOp::And, var("b"), var("c"))),
            )
        );
    }

    #[test]
    fn test_keyword_prefixed_identifiers() {
        let expr = parse_expression("order and notes").unwrap();
        assert_eq!(expr, Expr::Binary(BinaryOp::And, var("order"), var("notes")));
    }

    #[test]
    fn test_member_index_and_method_call() {
        let expr = parse_expression("service.send(properties['email'], 1)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                target: Some(var("service")),
                method: "send".to_string(),
                args: vec![
                    Expr::Index(var("properties"), lit(json!("email"))),
                    Expr::Literal(json!(1)),
                ],
            }
        );
    }

    #[test]
    fn test_string_escapes() {
        let expr = parse_expression(r#"'it\'s' ~ "a \"b\"""#).unwrap();
        assert_eq!(
            expr,
            Expr::Binary(BinaryOp::Concat, lit(json!("it's")), lit(json!("a \"b\"")))
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse_expression("null").unwrap(), Expr::Literal(Value::Null));
        assert_eq!(parse_expression("true").unwrap(), Expr::Literal(json!(true)));
        assert_eq!(parse_expression("2.5").unwrap(), Expr::Literal(json!(2.5)));
        assert_eq!(
            parse_expression("[1, 'a']").unwrap(),
            Expr::Array(vec![Expr::Literal(json!(1)), Expr::Literal(json!("a"))])
        );
    }

    #[test]
    fn test_negation_and_not() {
        assert_eq!(
            parse_expression("-value").unwrap(),
            Expr::Unary(UnaryOp::Neg, var("value"))
        );
        assert_eq!(
            parse_expression("not value").unwrap(),
            Expr::Unary(UnaryOp::Not, var("value"))
        );
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["", "1 +", "value >", "(1", "a ? b", "'open", "1 2"] {
            assert!(
                matches!(parse_expression(bad), Err(ExprError::Syntax(_))),
                "{bad:?} should not parse"
            );
        }
    }
}
