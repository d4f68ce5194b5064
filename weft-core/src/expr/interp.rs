//! Tree-walking interpreter.

use std::sync::Arc;

use super::ast::{AssignOp, BinaryOp, Expr, LogicalOp, PropertyKey, UnaryOp};
use super::builtins;
use super::{Evaluator, Scope};
use crate::dom::{Document, NodeId};
use crate::error::EvalError;
use crate::value::{Function, Object, Value};

pub(crate) struct Interpreter<'a> {
    pub evaluator: &'a Evaluator,
    pub scope: &'a Scope,
}

impl Interpreter<'_> {
    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.lookup(name),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::from(values))
            }
            Expr::Object(entries) => {
                let mut object = Object::new();
                for (key, value) in entries {
                    object.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::from(object))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                if let (Expr::Ident(name), PropertyKey::Named(key)) = (&**object, property) {
                    if name == "$store" && self.scope.local("$store").is_none() {
                        return Ok(self.scope.store().get(key));
                    }
                }
                let target = self.eval(object)?;
                if *optional && target.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.property_key(property)?;
                self.get_property(&target, &key)
            }
            Expr::Call { callee, args } => {
                let function = self.eval(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                match function {
                    Value::Function(f) => f.call(self.scope.store(), &args),
                    _ => Err(EvalError::NotCallable(describe(callee))),
                }
            }
            Expr::Unary(op, operand) => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, &**operand) {
                    return match self.lookup(name) {
                        Ok(value) => Ok(Value::from(value.type_name())),
                        Err(EvalError::UnknownIdentifier(_)) => Ok(Value::from("undefined")),
                        Err(err) => Err(err),
                    };
                }
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::from(value.type_name()),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                Ok(binary(*op, &lhs, &rhs))
            }
            Expr::Logical(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let short_circuit = match op {
                    LogicalOp::And => !lhs.is_truthy(),
                    LogicalOp::Or => lhs.is_truthy(),
                    LogicalOp::Nullish => !lhs.is_nullish(),
                };
                if short_circuit {
                    Ok(lhs)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Arrow { params, body } => Ok(self.closure(params.clone(), body.clone())),
            Expr::Assign { op, target, value } => {
                let value = self.eval(value)?;
                let value = match op {
                    AssignOp::Set => value,
                    AssignOp::Add => binary(BinaryOp::Add, &self.eval(target)?, &value),
                    AssignOp::Sub => binary(BinaryOp::Sub, &self.eval(target)?, &value),
                };
                self.assign(target, value.clone())?;
                Ok(value)
            }
            Expr::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(item)?;
                }
                Ok(last)
            }
        }
    }

    /// Resolve an identifier: locals, store, helpers, context members,
    /// globals, then the literal names.
    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.scope.local(name) {
            return Ok(value.clone());
        }
        let store = self.scope.store();
        if let Some(value) = store.try_get(name) {
            return Ok(value);
        }
        match name {
            "$el" => return Ok(self.scope.node().map_or(Value::Undefined, Value::Node)),
            "$store" => {
                let fields: Object = store
                    .keys()
                    .map(|key| (key.to_string(), store.get(key)))
                    .collect();
                return Ok(Value::from(fields));
            }
            "$s" => {
                return Ok(Value::function("$s", |_, args| {
                    Ok(Value::from(
                        args.first().map(Value::to_display_string).unwrap_or_default(),
                    ))
                }))
            }
            "$event" => return Ok(Value::Undefined),
            _ => {}
        }
        if let Some(value) = self.scope.context().and_then(|ctx| ctx.member(name)) {
            return Ok(value);
        }
        if let Some(value) = self.evaluator.global(name) {
            return Ok(value);
        }
        match name {
            "undefined" => Ok(Value::Undefined),
            "NaN" => Ok(Value::Number(f64::NAN)),
            "Infinity" => Ok(Value::Number(f64::INFINITY)),
            _ => Err(EvalError::UnknownIdentifier(name.to_string())),
        }
    }

    fn property_key(&self, property: &PropertyKey) -> Result<String, EvalError> {
        match property {
            PropertyKey::Named(name) => Ok(name.clone()),
            PropertyKey::Computed(expr) => Ok(self.eval(expr)?.to_js_string()),
        }
    }

    fn get_property(&self, target: &Value, key: &str) -> Result<Value, EvalError> {
        let value = match target {
            Value::Undefined | Value::Null => {
                return Err(EvalError::Type(format!(
                    "cannot read property `{key}` of {target}"
                )))
            }
            Value::Object(map) => map.get(key).cloned(),
            Value::Array(items) => match key {
                "length" => Some(Value::from(items.len())),
                _ => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            },
            Value::String(s) => match key {
                "length" => Some(Value::from(s.encode_utf16().count())),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::from(c.to_string())),
            },
            Value::Function(f) if key == "name" => Some(Value::from(f.name())),
            Value::Node(node) => Some(self.node_property(*node, key)?),
            _ => None,
        };
        Ok(value
            .or_else(|| builtins::method(target, key))
            .unwrap_or_default())
    }

    fn document(&self) -> Result<&Document, EvalError> {
        self.scope
            .document()
            .ok_or_else(|| EvalError::Type("node access requires a document".into()))
    }

    fn node_property(&self, node: NodeId, key: &str) -> Result<Value, EvalError> {
        let document = self.document()?;
        Ok(match key {
            "textContent" => Value::from(document.text_content(node)),
            "innerHTML" => Value::from(document.inner_html(node)),
            "tagName" => document
                .tag_name(node)
                .map_or(Value::Undefined, |tag| Value::from(tag.to_ascii_uppercase())),
            "parentNode" => document.parent(node).map_or(Value::Null, Value::Node),
            _ => match document.property(node, key) {
                Value::Undefined => document
                    .attribute(node, key)
                    .map_or(Value::Undefined, Value::from),
                value => value,
            },
        })
    }

    fn assign(&self, target: &Expr, value: Value) -> Result<(), EvalError> {
        match target {
            Expr::Ident(name) => {
                let store = self.scope.store();
                if store.contains_key(name) {
                    store.set(name, value)?;
                    return Ok(());
                }
                if let Some(ctx) = self.scope.context() {
                    if ctx.set_member(name, value) {
                        return Ok(());
                    }
                }
                Err(EvalError::NotAssignable(name.clone()))
            }
            Expr::Member {
                object, property, ..
            } => {
                let key = self.property_key(property)?;
                if matches!(&**object, Expr::Ident(name) if name == "$store") {
                    self.scope.store().set(&key, value)?;
                    return Ok(());
                }
                match self.eval(object)? {
                    Value::Node(node) => {
                        let document = self.document()?;
                        match key.as_str() {
                            "textContent" => document
                                .set_text_content(node, &value.to_js_string())
                                .map_err(|err| EvalError::Type(err.to_string())),
                            _ => document
                                .set_property(node, &key, value)
                                .map_err(|err| EvalError::Type(err.to_string())),
                        }
                    }
                    _ => Err(EvalError::NotAssignable(describe(target))),
                }
            }
            _ => Err(EvalError::NotAssignable(describe(target))),
        }
    }

    fn closure(&self, params: Arc<[String]>, body: Arc<[Expr]>) -> Value {
        let evaluator = self.evaluator.clone();
        let scope = self.scope.clone();
        Value::Function(Function::new("anonymous", move |_, args| {
            let mut local = scope.clone();
            for (i, param) in params.iter().enumerate() {
                local = local.with_local(param, args.get(i).cloned().unwrap_or_default());
            }
            let interpreter = Interpreter {
                evaluator: &evaluator,
                scope: &local,
            };
            let mut last = Value::Undefined;
            for expr in body.iter() {
                last = interpreter.eval(expr)?;
            }
            Ok(last)
        }))
    }
}

fn is_stringy(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Node(_)
    )
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    match op {
        BinaryOp::Add if is_stringy(lhs) || is_stringy(rhs) => {
            Value::from(lhs.to_js_string() + &rhs.to_js_string())
        }
        BinaryOp::Add => Value::Number(lhs.to_number() + rhs.to_number()),
        BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        BinaryOp::Rem => Value::Number(lhs.to_number() % rhs.to_number()),
        BinaryOp::Eq => Value::Bool(lhs.loose_equals(rhs)),
        BinaryOp::Ne => Value::Bool(!lhs.loose_equals(rhs)),
        BinaryOp::StrictEq => Value::Bool(lhs.strict_equals(rhs)),
        BinaryOp::StrictNe => Value::Bool(!lhs.strict_equals(rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => lhs.to_number().partial_cmp(&rhs.to_number()),
            };
            Value::Bool(ordering.is_some_and(|ord| match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object,
            property: PropertyKey::Named(key),
            ..
        } => format!("{}.{key}", describe(object)),
        Expr::Member { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}
