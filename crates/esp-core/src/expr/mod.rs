//! Expression language used by rule criteria and task methods.
//!
//! Expressions are parsed once with [`Expression::parse`] and evaluated
//! against a [`Scope`] of JSON bindings. Supported syntax:
//!
//! - literals: `null`, `true`, `42`, `2.5`, `'text'`, `[1, 2]`
//! - access: `properties['email']`, `relationships.customer.tier`
//! - operators: `not`/`!`, unary `-`, `* / %`, `+ - ~`, comparisons and `in`,
//!   `and`/`&&`, `or`/`||`, and `cond ? a : b`
//! - calls: `service.method(args...)`, dispatched to the task's service

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;

use serde_json::Value;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use error::{ExprError, ExprResult};
pub use eval::{evaluate, truthy, Scope, SERVICE_VAR};
pub use parser::parse_expression;

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> ExprResult<Self> {
        Ok(Self {
            source: source.to_string(),
            ast: parse_expression(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn evaluate(&self, scope: &Scope<'_>) -> ExprResult<Value> {
        evaluate(&self.ast, scope)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}
