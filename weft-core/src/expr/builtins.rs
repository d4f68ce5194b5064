//! Globals and built-in methods available to expressions.

use indexmap::IndexMap;

use crate::error::EvalError;
use crate::store::Store;
use crate::value::{Function, Value};

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn number_fn(name: &str, f: fn(f64) -> f64) -> (String, Value) {
    (
        name.to_string(),
        Value::function(name, move |_, args| Ok(Value::Number(f(arg(args, 0).to_number())))),
    )
}

fn fold_fn(name: &str, init: f64, f: fn(f64, f64) -> f64) -> (String, Value) {
    (
        name.to_string(),
        Value::function(name, move |_, args| {
            Ok(Value::Number(
                args.iter().map(Value::to_number).fold(init, |acc, n| {
                    if acc.is_nan() || n.is_nan() {
                        f64::NAN
                    } else {
                        f(acc, n)
                    }
                }),
            ))
        }),
    )
}

/// The default global bindings.
pub(crate) fn globals() -> IndexMap<String, Value> {
    let math = Value::object([
        number_fn("floor", f64::floor),
        number_fn("ceil", f64::ceil),
        number_fn("round", |n| (n + 0.5).floor()),
        number_fn("abs", f64::abs),
        number_fn("sqrt", f64::sqrt),
        number_fn("trunc", f64::trunc),
        fold_fn("min", f64::INFINITY, f64::min),
        fold_fn("max", f64::NEG_INFINITY, f64::max),
        ("PI".to_string(), Value::Number(std::f64::consts::PI)),
    ]);

    let json = Value::object([
        (
            "stringify",
            Value::function("stringify", |_, args| {
                let value = arg(args, 0);
                if matches!(value, Value::Undefined | Value::Function(_)) {
                    return Ok(Value::Undefined);
                }
                serde_json::to_string(&value)
                    .map(Value::from)
                    .map_err(|err| EvalError::Type(err.to_string()))
            }),
        ),
        (
            "parse",
            Value::function("parse", |_, args| {
                serde_json::from_str::<serde_json::Value>(&arg(args, 0).to_js_string())
                    .map(Value::from)
                    .map_err(|err| EvalError::Type(format!("JSON.parse: {err}")))
            }),
        ),
    ]);

    let array = Value::object([(
        "isArray",
        Value::function("isArray", |_, args| {
            Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
        }),
    )]);

    IndexMap::from([
        ("Math".to_string(), math),
        ("JSON".to_string(), json),
        ("Array".to_string(), array),
        (
            "String".to_string(),
            Value::function("String", |_, args| Ok(Value::from(arg(args, 0).to_js_string()))),
        ),
        (
            "Number".to_string(),
            Value::function("Number", |_, args| Ok(Value::Number(arg(args, 0).to_number()))),
        ),
        (
            "Boolean".to_string(),
            Value::function("Boolean", |_, args| Ok(Value::Bool(arg(args, 0).is_truthy()))),
        ),
        (
            "isNaN".to_string(),
            Value::function("isNaN", |_, args| Ok(Value::Bool(arg(args, 0).to_number().is_nan()))),
        ),
        (
            "parseFloat".to_string(),
            Value::function("parseFloat", |_, args| {
                Ok(Value::Number(parse_float_prefix(&arg(args, 0).to_js_string())))
            }),
        ),
        (
            "parseInt".to_string(),
            Value::function("parseInt", |_, args| {
                Ok(Value::Number(parse_float_prefix(&arg(args, 0).to_js_string()).trunc()))
            }),
        ),
    ])
}

/// Longest numeric prefix, `NaN` when there is none.
fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    (1..=s.len())
        .rev()
        .filter(|end| s.is_char_boundary(*end))
        .find_map(|end| s[..end].parse::<f64>().ok().filter(|n| n.is_finite() || s[..end].contains("inf")))
        .unwrap_or(f64::NAN)
}

/// A method of a string, array or number, bound to `receiver`.
pub(crate) fn method(receiver: &Value, name: &str) -> Option<Value> {
    let this = receiver.clone();
    let bound = |call: fn(&Store, &Value, &[Value]) -> Result<Value, EvalError>| {
        Some(Value::Function(Function::new(name, move |store, args| {
            call(store, &this, args)
        })))
    };

    match (receiver, name) {
        (Value::String(_), "toUpperCase") => bound(|_, this, _| Ok(Value::from(this.to_js_string().to_uppercase()))),
        (Value::String(_), "toLowerCase") => bound(|_, this, _| Ok(Value::from(this.to_js_string().to_lowercase()))),
        (Value::String(_), "trim") => bound(|_, this, _| Ok(Value::from(this.to_js_string().trim()))),
        (Value::String(_), "includes") => bound(|_, this, args| {
            Ok(Value::Bool(this.to_js_string().contains(&arg(args, 0).to_js_string())))
        }),
        (Value::String(_), "startsWith") => bound(|_, this, args| {
            Ok(Value::Bool(this.to_js_string().starts_with(&arg(args, 0).to_js_string())))
        }),
        (Value::String(_), "split") => bound(|_, this, args| {
            let text = this.to_js_string();
            let separator = arg(args, 0).to_js_string();
            let parts: Vec<Value> = if separator.is_empty() {
                text.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                text.split(separator.as_str()).map(Value::from).collect()
            };
            Ok(Value::from(parts))
        }),
        (Value::Array(_), "includes") => bound(|_, this, args| {
            let needle = arg(args, 0);
            Ok(Value::Bool(items(this).iter().any(|v| v == &needle)))
        }),
        (Value::Array(_), "indexOf") => bound(|_, this, args| {
            let needle = arg(args, 0);
            Ok(items(this)
                .iter()
                .position(|v| v.strict_equals(&needle))
                .map_or(Value::Number(-1.0), Value::from))
        }),
        (Value::Array(_), "join") => bound(|_, this, args| {
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_js_string(),
            };
            let parts: Vec<String> = items(this)
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect();
            Ok(Value::from(parts.join(&separator)))
        }),
        (Value::Array(_), "concat") => bound(|_, this, args| {
            let mut out = items(this).to_vec();
            for value in args {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::from(out))
        }),
        (Value::Array(_), "slice") => bound(|_, this, args| {
            let list = items(this);
            let start = clamp_index(arg(args, 0), list.len(), 0);
            let end = clamp_index(arg(args, 1), list.len(), list.len());
            Ok(Value::from(list.get(start..end.max(start)).unwrap_or_default().to_vec()))
        }),
        (Value::Array(_), "map") => bound(|store, this, args| {
            let callback = callable(&arg(args, 0), "map")?;
            let out = items(this)
                .iter()
                .enumerate()
                .map(|(i, v)| callback.call(store, &[v.clone(), Value::from(i)]))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::from(out))
        }),
        (Value::Array(_), "filter") => bound(|store, this, args| {
            let callback = callable(&arg(args, 0), "filter")?;
            let mut out = Vec::new();
            for (i, v) in items(this).iter().enumerate() {
                if callback.call(store, &[v.clone(), Value::from(i)])?.is_truthy() {
                    out.push(v.clone());
                }
            }
            Ok(Value::from(out))
        }),
        (Value::Number(_), "toFixed") => bound(|_, this, args| {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Ok(Value::from(format!("{:.*}", digits, this.to_number())))
        }),
        (_, "toString") if !receiver.is_nullish() => bound(|_, this, _| Ok(Value::from(this.to_js_string()))),
        _ => None,
    }
}

fn items(value: &Value) -> &[Value] {
    value.as_array().unwrap_or_default()
}

fn callable(value: &Value, method: &str) -> Result<Function, EvalError> {
    match value {
        Value::Function(f) => Ok(f.clone()),
        other => Err(EvalError::NotCallable(format!("{method} callback {other}"))),
    }
}

fn clamp_index(value: Value, len: usize, default: usize) -> usize {
    if value.is_nullish() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
