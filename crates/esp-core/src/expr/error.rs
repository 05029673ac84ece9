//! Error types for the expression language.

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unbound variable '{0}'")]
    UnboundVariable(String),

    #[error("unknown function '{0}': only service methods can be called")]
    UnknownFunction(String),

    #[error("method '{method}' called on something that is not a service")]
    NotCallable { method: String },

    #[error("no service is bound for method '{method}'")]
    NoService { method: String },

    #[error("service method '{method}' failed: {message}")]
    Service { method: String, message: String },

    #[error("cannot apply '{op}' to {found}")]
    InvalidOperand { op: String, found: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic result is not a finite number")]
    NonFinite,
}

/// Result type for expression operations.
pub type ExprResult<T> = std::result::Result<T, ExprError>;

impl From<pest::error::Error<super::parser::Rule>> for ExprError {
    fn from(err: pest::error::Error<super::parser::Rule>) -> Self {
        ExprError::Syntax(err.to_string())
    }
}
