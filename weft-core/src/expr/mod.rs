//! Expression Evaluator
//!
//! Markup attributes carry small expressions (`count + 1`, `open = !open`,
//! `user?.name ?? 'anonymous'`). This module compiles them into a syntax
//! tree once per distinct source string and evaluates the tree against an
//! explicit [`Scope`].
//!
//! # How Evaluation Works
//!
//! 1. `compile` looks the source up in a concurrent cache and parses it on a
//!    miss. Only successful compilations are cached.
//! 2. The interpreter walks the tree. Identifiers resolve through the scope:
//!    local bindings, store fields, the `$el` / `$store` / `$s` / `$event`
//!    helpers, members of the owning component, evaluator globals.
//! 3. Store reads go through the store's signals, so evaluating inside an
//!    effect subscribes that effect to exactly the fields it read.
//!
//! There is no fallback to ambient state: a name that resolves nowhere is an
//! [`EvalError::UnknownIdentifier`].

mod ast;
mod builtins;
mod interp;
mod lexer;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{trace, warn};

use self::ast::Expr;
use self::interp::Interpreter;
use crate::component::ComponentContext;
use crate::dom::{Document, NodeId};
use crate::error::EvalError;
use crate::store::Store;
use crate::value::Value;

/// Everything an expression may refer to, passed explicitly per call.
#[derive(Clone)]
pub struct Scope {
    store: Store,
    node: Option<NodeId>,
    context: Option<Arc<ComponentContext>>,
    document: Option<Document>,
    locals: IndexMap<String, Value>,
}

impl Scope {
    pub fn new(store: &Store) -> Self {
        Self {
            store: store.clone(),
            node: None,
            context: None,
            document: None,
            locals: IndexMap::new(),
        }
    }

    /// The node the expression is bound to (`$el`).
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// The owning component. Also provides the document unless one was set.
    pub fn with_context(mut self, context: &Arc<ComponentContext>) -> Self {
        if self.document.is_none() {
            self.document = Some(context.document().clone());
        }
        self.context = Some(context.clone());
        self
    }

    pub fn with_document(mut self, document: &Document) -> Self {
        self.document = Some(document.clone());
        self
    }

    /// Bind a local name. Locals shadow everything else.
    pub fn with_local(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn context(&self) -> Option<&Arc<ComponentContext>> {
        self.context.as_ref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("node", &self.node)
            .field("context", &self.context.as_ref().map(|ctx| ctx.element()))
            .field("locals", &self.locals)
            .finish()
    }
}

/// A compiled expression.
#[derive(Clone)]
pub struct Expression {
    source: Arc<str>,
    ast: Arc<Expr>,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

struct EvaluatorInner {
    cache: DashMap<Arc<str>, Arc<Expr>>,
    compiles: AtomicUsize,
    globals: RwLock<IndexMap<String, Value>>,
}

/// Compiles and evaluates expressions.
///
/// Cloning yields a handle to the same cache.
#[derive(Clone)]
pub struct Evaluator {
    inner: Arc<EvaluatorInner>,
}

impl Evaluator {
    /// An evaluator with the default globals (`Math`, `JSON`, `String`, ...).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EvaluatorInner {
                cache: DashMap::new(),
                compiles: AtomicUsize::new(0),
                globals: RwLock::new(builtins::globals()),
            }),
        }
    }

    /// Compile `src`, reusing the cached tree for a source seen before.
    pub fn compile(&self, src: &str) -> Result<Expression, EvalError> {
        if let Some(entry) = self.inner.cache.get(src) {
            return Ok(Expression {
                source: entry.key().clone(),
                ast: entry.value().clone(),
            });
        }

        self.inner.compiles.fetch_add(1, Ordering::Relaxed);
        let ast = Arc::new(ast::parse(src)?);
        let source: Arc<str> = Arc::from(src);
        trace!(expression = src, "compiled");
        self.inner.cache.insert(source.clone(), ast.clone());
        Ok(Expression { source, ast })
    }

    /// Evaluate a compiled expression.
    pub fn run(&self, expression: &Expression, scope: &Scope) -> Result<Value, EvalError> {
        Interpreter {
            evaluator: self,
            scope,
        }
        .eval(&expression.ast)
    }

    /// Compile and evaluate `src`.
    pub fn try_evaluate(&self, src: &str, scope: &Scope) -> Result<Value, EvalError> {
        let expression = self.compile(src)?;
        self.run(&expression, scope)
    }

    /// Compile and evaluate `src`; failures are logged and yield
    /// `undefined`.
    pub fn evaluate(&self, src: &str, scope: &Scope) -> Value {
        match self.try_evaluate(src, scope) {
            Ok(value) => value,
            Err(err) => {
                warn!(expression = src, error = %err, "expression failed");
                Value::Undefined
            }
        }
    }

    /// Number of real (uncached) compilations so far.
    pub fn compile_count(&self) -> usize {
        self.inner.compiles.load(Ordering::Relaxed)
    }

    /// Number of cached expressions.
    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }

    /// Define or replace a global binding.
    pub fn set_global(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.globals.write().insert(name.into(), value.into());
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.inner.globals.read().get(name).cloned()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("cached", &self.cache_len())
            .field("compiles", &self.compile_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
