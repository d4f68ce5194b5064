//! Reactive Store
//!
//! The store is the keyed table one application's components share. Every
//! non-function field is backed by a [`Signal`], so reading a field inside an
//! effect subscribes that effect and writing a field schedules it. Function
//! fields are methods: stored as-is and never wrapped.
//!
//! The key set is fixed at construction. Only the values behind
//! signal-backed keys change afterwards.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::error::{EvalError, StoreError};
use crate::reactive::{Scheduler, Signal};
use crate::value::{Function, Object, Value};

enum Field {
    Reactive(Signal<Value>),
    Method(Function),
}

struct StoreInner {
    fields: IndexMap<String, Field>,
    scheduler: Scheduler,
}

/// Shared reactive key/value table.
///
/// Cloning yields another handle to the same table.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Wrap a plain key/value table.
    ///
    /// Function values become methods; everything else gets its own signal.
    pub fn reactive<K, I>(scheduler: &Scheduler, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| {
                let field = match value {
                    Value::Function(f) => Field::Method(f),
                    other => Field::Reactive(Signal::new(scheduler, other)),
                };
                (key.into(), field)
            })
            .collect();

        Self {
            inner: Arc::new(StoreInner {
                fields,
                scheduler: scheduler.clone(),
            }),
        }
    }

    /// An empty store.
    pub fn empty(scheduler: &Scheduler) -> Self {
        Self::reactive::<String, _>(scheduler, [])
    }

    /// Read a field.
    ///
    /// Unknown keys read as `null` so speculative lookups never fail.
    pub fn get(&self, key: &str) -> Value {
        self.try_get(key).unwrap_or(Value::Null)
    }

    /// Read a field, distinguishing unknown keys.
    pub fn try_get(&self, key: &str) -> Option<Value> {
        match self.inner.fields.get(key)? {
            Field::Reactive(signal) => Some(signal.get()),
            Field::Method(f) => Some(Value::Function(f.clone())),
        }
    }

    /// Read a field without subscribing the running effect.
    pub fn get_untracked(&self, key: &str) -> Value {
        match self.inner.fields.get(key) {
            Some(Field::Reactive(signal)) => signal.get_untracked(),
            Some(Field::Method(f)) => Value::Function(f.clone()),
            None => Value::Null,
        }
    }

    /// Write a field. Returns whether the value changed.
    ///
    /// Methods cannot be overwritten and the key set cannot grow. Assigning a
    /// function to a signal-backed field keeps it signal-backed.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool, StoreError> {
        match self.inner.fields.get(key) {
            Some(Field::Reactive(signal)) => {
                let value = value.into();
                trace!(key, ?value, "store write");
                Ok(signal.set(value))
            }
            Some(Field::Method(_)) => {
                warn!(key, "cannot overwrite a function value");
                Err(StoreError::MethodOverwrite(key.to_string()))
            }
            None => Err(StoreError::UnknownKey(key.to_string())),
        }
    }

    /// Write a field using a function of its current (untracked) value.
    pub fn update<F>(&self, key: &str, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&Value) -> Value,
    {
        match self.inner.fields.get(key) {
            Some(Field::Reactive(signal)) => Ok(signal.update(f)),
            Some(Field::Method(_)) => Err(StoreError::MethodOverwrite(key.to_string())),
            None => Err(StoreError::UnknownKey(key.to_string())),
        }
    }

    /// Call a method field.
    pub fn call(&self, key: &str, args: &[Value]) -> Result<Value, EvalError> {
        match self.inner.fields.get(key) {
            Some(Field::Method(f)) => f.call(self, args),
            Some(Field::Reactive(signal)) => match signal.get() {
                Value::Function(f) => f.call(self, args),
                _ => Err(EvalError::NotCallable(key.to_string())),
            },
            None => Err(EvalError::UnknownIdentifier(key.to_string())),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.contains_key(key)
    }

    /// Whether `key` is a method field.
    pub fn is_method(&self, key: &str) -> bool {
        matches!(self.inner.fields.get(key), Some(Field::Method(_)))
    }

    /// Field names in definition order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.is_empty()
    }

    /// The signal behind a field, if it is signal-backed.
    pub fn signal(&self, key: &str) -> Option<Signal<Value>> {
        match self.inner.fields.get(key)? {
            Field::Reactive(signal) => Some(signal.clone()),
            Field::Method(_) => None,
        }
    }

    /// Untracked snapshot of every field as an object value.
    pub fn to_object(&self) -> Value {
        let map: Object = self
            .keys()
            .map(|key| (key.to_string(), self.get_untracked(key)))
            .collect();
        Value::from(map)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Whether two handles share one table.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, field) in &self.inner.fields {
            match field {
                Field::Reactive(signal) => map.entry(key, &signal.get_untracked()),
                Field::Method(func) => map.entry(key, func),
            };
        }
        map.finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
