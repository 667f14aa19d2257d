use crate::value::{self, lookup, type_name};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A host-provided expression function. Errors are plain messages; the
/// evaluator wraps them with the function name.
pub type Function = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// The set of functions an expression may call.
///
/// Function names are resolved when an expression is compiled, so a typo in
/// a configured alert fails at load time instead of on every evaluation.
///
/// # Examples
///
/// ```
/// use rinc_alert::expr::Expr;
/// use rinc_alert::functions::Functions;
/// use serde_json::{json, Value};
/// use std::sync::Arc;
///
/// let mut functions = Functions::standard();
/// functions.register("double", |args: &[Value]| {
///     let n = args.first().and_then(Value::as_f64).ok_or("expected a number")?;
///     Ok(json!(n * 2.0))
/// });
///
/// let expr = Expr::compile_with("double(x) == 4", Arc::new(functions)).unwrap();
/// assert!(expr.evaluate_bool(&json!({"x": 2})).unwrap());
/// ```
#[derive(Clone, Default)]
pub struct Functions {
    table: HashMap<String, Arc<Function>>,
}

impl Functions {
    /// An empty function set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default functions available to configured alerts.
    pub fn standard() -> Self {
        let mut f = Self::new();
        f.register("len", len);
        f.register("contains", contains);
        f.register("lower", |args: &[Value]| {
            Ok(Value::from(string_arg(args, 0)?.to_lowercase()))
        });
        f.register("upper", |args: &[Value]| {
            Ok(Value::from(string_arg(args, 0)?.to_uppercase()))
        });
        f.register("abs", |args: &[Value]| to_number(number_arg(args, 0)?.abs()));
        f.register("round", round);
        f.register("min", |args: &[Value]| fold_numbers(args, f64::min));
        f.register("max", |args: &[Value]| fold_numbers(args, f64::max));
        f.register("sum", sum);
        f.register("pluck", pluck);
        f.register("days", |args: &[Value]| to_number(number_arg(args, 0)? * 86_400.0));
        f.register("hours", |args: &[Value]| to_number(number_arg(args, 0)? * 3_600.0));
        f.register("minutes", |args: &[Value]| to_number(number_arg(args, 0)? * 60.0));
        f
    }

    /// Registers `func` under `name`, replacing any previous function with
    /// that name.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.table.insert(name.into(), Arc::new(func));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Function>> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }
}

impl std::fmt::Debug for Functions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Functions").field("names", &names).finish()
    }
}

fn arg(args: &[Value], i: usize) -> Result<&Value, String> {
    args.get(i)
        .ok_or_else(|| format!("missing argument {}", i + 1))
}

fn number_arg(args: &[Value], i: usize) -> Result<f64, String> {
    let v = arg(args, i)?;
    v.as_f64()
        .ok_or_else(|| format!("argument {} must be a number, got {}", i + 1, type_name(v)))
}

fn string_arg(args: &[Value], i: usize) -> Result<&str, String> {
    let v = arg(args, i)?;
    v.as_str()
        .ok_or_else(|| format!("argument {} must be a string, got {}", i + 1, type_name(v)))
}

fn to_number(n: f64) -> Result<Value, String> {
    value::number(n).map_err(|e| e.to_string())
}

fn len(args: &[Value]) -> Result<Value, String> {
    let n = match arg(args, 0)? {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        Value::Object(o) => o.len(),
        Value::Null => 0,
        other => return Err(format!("cannot take length of {}", type_name(other))),
    };
    Ok(Value::from(n))
}

fn contains(args: &[Value]) -> Result<Value, String> {
    let needle = arg(args, 1)?;
    let found = match arg(args, 0)? {
        Value::String(s) => match needle {
            Value::String(n) => s.contains(n.as_str()),
            other => return Err(format!("cannot search a string for {}", type_name(other))),
        },
        Value::Array(items) => items.iter().any(|item| value::equals(item, needle)),
        Value::Object(o) => needle.as_str().is_some_and(|k| o.contains_key(k)),
        other => return Err(format!("cannot search {}", type_name(other))),
    };
    Ok(Value::Bool(found))
}

fn round(args: &[Value]) -> Result<Value, String> {
    let n = number_arg(args, 0)?;
    let digits = match args.get(1) {
        Some(_) => number_arg(args, 1)? as i32,
        None => 0,
    };
    let scale = 10f64.powi(digits);
    to_number((n * scale).round() / scale)
}

/// Accepts either variadic numbers or a single array of numbers.
fn numbers(args: &[Value]) -> Result<Vec<f64>, String> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| format!("expected numbers, got {}", type_name(v)))
        })
        .collect()
}

fn fold_numbers(args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, String> {
    let nums = numbers(args)?;
    let mut iter = nums.into_iter();
    let first = iter.next().ok_or("needs at least one number")?;
    to_number(iter.fold(first, f))
}

fn sum(args: &[Value]) -> Result<Value, String> {
    to_number(numbers(args)?.into_iter().sum())
}

/// `pluck(items, "field")` collects one field from every object in `items`;
/// objects without the field contribute nil.
fn pluck(args: &[Value]) -> Result<Value, String> {
    let items = match arg(args, 0)? {
        Value::Array(items) => items,
        other => return Err(format!("argument 1 must be an array, got {}", type_name(other))),
    };
    let field = string_arg(args, 1)?;
    let plucked = items
        .iter()
        .map(|item| match item {
            Value::Object(o) => lookup(o, field).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        })
        .collect();
    Ok(Value::Array(plucked))
}
