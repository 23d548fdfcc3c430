//! Evaluation of parsed expressions against a parameter environment.

use super::parser::Expr;
use super::{Environment, ExpressionError, region};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// `{{`, `}}` and `{index[:format]}` in `format()` templates.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{(\d+)(?::[^}]*)?\}").expect("placeholder pattern is valid")
});

pub(crate) fn evaluate(expr: &Expr, env: &Environment) -> Result<Value, ExpressionError> {
    match expr {
        Expr::String(value) => Ok(Value::String(value.clone())),
        Expr::Integer(value) => Ok(Value::from(*value)),
        Expr::Property { target, name } => {
            let target = evaluate(target, env)?;
            property(&target, name)
        }
        Expr::Index { target, index } => {
            let target = evaluate(target, env)?;
            let index = evaluate(index, env)?;
            match &index {
                Value::String(name) => property(&target, name),
                Value::Number(n) => {
                    let element = n
                        .as_u64()
                        .and_then(|i| target.as_array()?.get(usize::try_from(i).ok()?));
                    element.cloned().ok_or_else(|| ExpressionError::Access {
                        accessor: format!("index {n}"),
                        value: render(&target),
                    })
                }
                other => Err(ExpressionError::Access {
                    accessor: format!("index {}", render(other)),
                    value: render(&target),
                }),
            }
        }
        Expr::Call { name, args } => call(name, args, env),
    }
}

fn property(target: &Value, name: &str) -> Result<Value, ExpressionError> {
    let found = target.as_object().and_then(|object| {
        object.get(name).or_else(|| {
            object
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    });
    found.cloned().ok_or_else(|| ExpressionError::Access {
        accessor: format!("property `{name}`"),
        value: render(target),
    })
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

struct Args<'a> {
    function: &'a str,
    values: Vec<Value>,
}

impl Args<'_> {
    fn exactly(&self, n: usize, expected: &'static str) -> Result<(), ExpressionError> {
        if self.values.len() == n {
            Ok(())
        } else {
            Err(self.arity(expected))
        }
    }

    fn between(&self, min: usize, max: usize, expected: &'static str) -> Result<(), ExpressionError> {
        if (min..=max).contains(&self.values.len()) {
            Ok(())
        } else {
            Err(self.arity(expected))
        }
    }

    fn arity(&self, expected: &'static str) -> ExpressionError {
        ExpressionError::Arity {
            function: self.function.to_string(),
            expected,
            actual: self.values.len(),
        }
    }

    fn type_error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Type {
            function: self.function.to_string(),
            message: message.into(),
        }
    }

    fn string(&self, i: usize) -> Result<&str, ExpressionError> {
        self.values[i]
            .as_str()
            .ok_or_else(|| self.type_error(format!("argument {} must be a string", i + 1)))
    }

    fn bool(&self, i: usize) -> Result<bool, ExpressionError> {
        self.values[i]
            .as_bool()
            .ok_or_else(|| self.type_error(format!("argument {} must be a boolean", i + 1)))
    }

    fn int(&self, i: usize) -> Result<i64, ExpressionError> {
        self.values[i]
            .as_i64()
            .ok_or_else(|| self.type_error(format!("argument {} must be an integer", i + 1)))
    }
}

fn call(name: &str, args: &[Expr], env: &Environment) -> Result<Value, ExpressionError> {
    let lower = name.to_ascii_lowercase();

    // `if` only evaluates the branch it takes.
    if lower == "if" {
        if args.len() != 3 {
            return Err(ExpressionError::Arity {
                function: name.to_string(),
                expected: "3",
                actual: args.len(),
            });
        }
        let condition = evaluate(&args[0], env)?;
        let Some(condition) = condition.as_bool() else {
            return Err(ExpressionError::Type {
                function: name.to_string(),
                message: "argument 1 must be a boolean".to_string(),
            });
        };
        return evaluate(if condition { &args[1] } else { &args[2] }, env);
    }

    let values = args
        .iter()
        .map(|arg| evaluate(arg, env))
        .collect::<Result<Vec<_>, _>>()?;
    let args = Args {
        function: name,
        values,
    };

    match lower.as_str() {
        "parameters" => {
            args.exactly(1, "1")?;
            let key = args.string(0)?;
            env.get(key)
                .or_else(|| {
                    env.iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(key))
                        .map(|(_, value)| value)
                })
                .cloned()
                .ok_or_else(|| ExpressionError::UnknownParameter(key.to_string()))
        }
        "concat" => {
            if args.values.iter().all(Value::is_array) && !args.values.is_empty() {
                let joined = args
                    .values
                    .into_iter()
                    .flat_map(|value| match value {
                        Value::Array(items) => items,
                        _ => Vec::new(),
                    })
                    .collect();
                return Ok(Value::Array(joined));
            }
            let mut out = String::new();
            for value in &args.values {
                out.push_str(&stringify(value));
            }
            Ok(Value::String(out))
        }
        "format" => {
            if args.values.is_empty() {
                return Err(args.arity("at least 1"));
            }
            let template = args.string(0)?;
            format(template, &args.values[1..]).map_err(|message| args.type_error(message))
        }
        "tolower" => {
            args.exactly(1, "1")?;
            Ok(Value::String(args.string(0)?.to_lowercase()))
        }
        "toupper" => {
            args.exactly(1, "1")?;
            Ok(Value::String(args.string(0)?.to_uppercase()))
        }
        "trim" => {
            args.exactly(1, "1")?;
            Ok(Value::String(args.string(0)?.trim().to_string()))
        }
        "string" => {
            args.exactly(1, "1")?;
            Ok(Value::String(stringify(&args.values[0])))
        }
        "int" => {
            args.exactly(1, "1")?;
            match &args.values[0] {
                Value::Number(n) if n.is_i64() => Ok(args.values[0].clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| args.type_error(format!("`{s}` is not an integer"))),
                _ => Err(args.type_error("argument 1 must be a string or integer")),
            }
        }
        "true" => {
            args.exactly(0, "0")?;
            Ok(Value::Bool(true))
        }
        "false" => {
            args.exactly(0, "0")?;
            Ok(Value::Bool(false))
        }
        "null" => {
            args.exactly(0, "0")?;
            Ok(Value::Null)
        }
        "equals" => {
            args.exactly(2, "2")?;
            Ok(Value::Bool(args.values[0] == args.values[1]))
        }
        "not" => {
            args.exactly(1, "1")?;
            Ok(Value::Bool(!args.bool(0)?))
        }
        "and" | "or" => {
            if args.values.len() < 2 {
                return Err(args.arity("at least 2"));
            }
            let mut flags = Vec::with_capacity(args.values.len());
            for i in 0..args.values.len() {
                flags.push(args.bool(i)?);
            }
            Ok(Value::Bool(if lower == "and" {
                flags.iter().all(|flag| *flag)
            } else {
                flags.iter().any(|flag| *flag)
            }))
        }
        "empty" => {
            args.exactly(1, "1")?;
            Ok(Value::Bool(match &args.values[0] {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            }))
        }
        "coalesce" => {
            if args.values.is_empty() {
                return Err(args.arity("at least 1"));
            }
            Ok(args
                .values
                .into_iter()
                .find(|value| !value.is_null())
                .unwrap_or(Value::Null))
        }
        "replace" => {
            args.exactly(3, "3")?;
            Ok(Value::String(
                args.string(0)?.replace(args.string(1)?, args.string(2)?),
            ))
        }
        "substring" => {
            args.between(2, 3, "2 or 3")?;
            let chars: Vec<char> = args.string(0)?.chars().collect();
            let start = usize::try_from(args.int(1)?)
                .map_err(|_| args.type_error("start index must not be negative"))?;
            let len = if args.values.len() == 3 {
                usize::try_from(args.int(2)?)
                    .map_err(|_| args.type_error("length must not be negative"))?
            } else {
                chars.len().saturating_sub(start)
            };
            if start + len > chars.len() {
                return Err(args.type_error(format!(
                    "range {start}..{} is outside a string of length {}",
                    start + len,
                    chars.len()
                )));
            }
            Ok(Value::String(chars[start..start + len].iter().collect()))
        }
        "length" => {
            args.exactly(1, "1")?;
            let len = match &args.values[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                _ => return Err(args.type_error("argument 1 must be a string, array or object")),
            };
            Ok(Value::from(len))
        }
        "contains" => {
            args.exactly(2, "2")?;
            let found = match (&args.values[0], &args.values[1]) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Value::Array(items), needle) => items.contains(needle),
                (Value::Object(map), Value::String(key)) => map.contains_key(key),
                _ => return Err(args.type_error("unsupported argument types")),
            };
            Ok(Value::Bool(found))
        }
        "startswith" | "endswith" => {
            args.exactly(2, "2")?;
            let value = args.string(0)?.to_lowercase();
            let affix = args.string(1)?.to_lowercase();
            Ok(Value::Bool(if lower == "startswith" {
                value.starts_with(&affix)
            } else {
                value.ends_with(&affix)
            }))
        }
        "split" => {
            args.exactly(2, "2")?;
            let value = args.string(0)?;
            let delimiter = args.string(1)?;
            if delimiter.is_empty() {
                return Err(args.type_error("delimiter must not be empty"));
            }
            Ok(Value::Array(
                value
                    .split(delimiter)
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        }
        "first" | "last" => {
            args.exactly(1, "1")?;
            let first = lower == "first";
            match &args.values[0] {
                Value::Array(items) => {
                    let item = if first { items.first() } else { items.last() };
                    Ok(item.cloned().unwrap_or(Value::Null))
                }
                Value::String(s) => {
                    let c = if first { s.chars().next() } else { s.chars().last() };
                    Ok(Value::String(c.map(String::from).unwrap_or_default()))
                }
                _ => Err(args.type_error("argument 1 must be a string or array")),
            }
        }
        "createarray" => Ok(Value::Array(args.values)),
        "regionshortname" => {
            args.exactly(1, "1")?;
            let location = args.string(0)?;
            region::short_name(location)
                .map(|short| Value::String(short.to_string()))
                .ok_or_else(|| args.type_error(format!("unknown region `{location}`")))
        }
        _ => Err(ExpressionError::UnknownFunction(name.to_string())),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn format(template: &str, values: &[Value]) -> Result<Value, String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();
        match caps.get(1) {
            Some(index) => {
                let value = index
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| values.get(i))
                    .ok_or_else(|| format!("placeholder `{}` has no argument", whole.as_str()))?;
                out.push_str(&stringify(value));
            }
            None => out.push_str(&whole.as_str()[..1]),
        }
    }
    out.push_str(&template[last..]);
    Ok(Value::String(out))
}
