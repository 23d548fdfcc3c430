//! Template expressions embedded in parameter values.
//!
//! A string parameter value of the form `[<expression>]` is evaluated;
//! anything else (including values starting with the `[[` escape) is a
//! literal. Expressions are function calls, single-quoted strings
//! (`''` escapes a quote), integers, and property or index accessors:
//!
//! ```text
//! expression := primary accessor*
//! primary    := STRING | INTEGER | IDENT '(' (expression (',' expression)*)? ')'
//! accessor   := '.' IDENT | '[' expression ']'
//! ```
//!
//! Function names are case-insensitive. Evaluation runs against a flat
//! parameter environment read through `parameters('name')`. Nesting is
//! limited to [`MAX_DEPTH`] levels; deeper input is a parse error.
//!
//! `regionShortName(location)` maps a region to its naming-convention short
//! name (`westeurope` -> `we`), so parameter values can build resource ids
//! such as `concat('law-', regionShortName(parameters('location')))`.

mod eval;
mod lexer;
mod parser;
mod region;

pub use parser::{Expr, MAX_DEPTH};
pub use region::short_name as region_short_name;

use serde_json::Value;
use std::collections::BTreeMap;

/// Parameter name -> value.
pub type Environment = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("function `{function}` expects {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("function `{function}`: {message}")]
    Type { function: String, message: String },

    #[error("parameter `{0}` not found")]
    UnknownParameter(String),

    #[error("cannot access {accessor} on {value}")]
    Access { accessor: String, value: String },
}

/// Whether `input` is an expression rather than a literal.
pub fn is_expression(input: &str) -> bool {
    expression_body(input).is_some()
}

fn expression_body(input: &str) -> Option<&str> {
    if input.starts_with("[[") {
        return None;
    }
    input.strip_prefix('[')?.strip_suffix(']')
}

/// Parse the body of an expression string.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    match expression_body(input) {
        Some(body) => parser::parse(body),
        None => Err(ExpressionError::Parse {
            offset: 0,
            message: "expression must be enclosed in `[` and `]`".to_string(),
        }),
    }
}

/// Evaluate a parameter value string.
///
/// Literals come back as JSON strings, with a leading `[[` unescaped to `[`.
pub fn evaluate(input: &str, env: &Environment) -> Result<Value, ExpressionError> {
    match expression_body(input) {
        Some(body) => {
            let expr = parser::parse(body)?;
            eval::evaluate(&expr, env)
        }
        None => {
            let literal = if input.starts_with("[[") {
                &input[1..]
            } else {
                input
            };
            Ok(Value::String(literal.to_string()))
        }
    }
}
