//! Directives
//!
//! A directive binds one attribute (or one interpolated text node) to the
//! reactive store. The walker hands every directive-bearing attribute to
//! [`process_directive`], which resolves the attribute name to a handler in
//! the runtime's [`DirectiveRegistry`] and invokes it with a
//! [`DirectiveArgs`] bundle.
//!
//! # Attribute Names
//!
//! | attribute        | handler | argument  |
//! |------------------|---------|-----------|
//! | `:name`          | `bind`  | `name`    |
//! | `@event`         | `on`    | `event`   |
//! | `x-bind:name`    | `bind`  | `name`    |
//! | `x-on:event`     | `on`    | `event`   |
//! | `x-name[:arg]`   | `name`  | `arg`     |
//!
//! Handlers create their effects through [`DirectiveArgs::effect`] so the
//! owning component disposes them, and register listeners against the
//! component's abort signal. A handler may also return a [`Cleanup`], which
//! is appended to the owning component.

mod bind;
mod effect;
mod html;
mod model;
mod on;
mod refs;
mod show;
mod text;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::component::ComponentContext;
use crate::dom::{Document, NodeId};
use crate::error::EvalError;
use crate::expr::Scope;
use crate::reactive::{Cleanup, Effect, EffectOutput};
use crate::store::Store;
use crate::value::Value;

/// Signature of a custom directive handler.
pub type DirectiveFn = dyn Fn(&DirectiveArgs) -> Option<Cleanup> + Send + Sync;

/// The directives every registry starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Bind,
    On,
    Text,
    Html,
    Show,
    Model,
    Effect,
    Ref,
}

impl Builtin {
    pub const ALL: [Builtin; 8] = [
        Builtin::Bind,
        Builtin::On,
        Builtin::Text,
        Builtin::Html,
        Builtin::Show,
        Builtin::Model,
        Builtin::Effect,
        Builtin::Ref,
    ];

    /// Registry name, as written after `x-`.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Bind => "bind",
            Builtin::On => "on",
            Builtin::Text => "text",
            Builtin::Html => "html",
            Builtin::Show => "show",
            Builtin::Model => "model",
            Builtin::Effect => "effect",
            Builtin::Ref => "ref",
        }
    }
}

/// A directive handler.
#[derive(Clone)]
pub enum Directive {
    Builtin(Builtin),
    Custom(Arc<DirectiveFn>),
}

impl Directive {
    /// Wrap a closure as a custom directive.
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&DirectiveArgs) -> Option<Cleanup> + Send + Sync + 'static,
    {
        Directive::Custom(Arc::new(handler))
    }

    /// Run the handler.
    pub fn apply(&self, args: &DirectiveArgs) -> Option<Cleanup> {
        match self {
            Directive::Builtin(Builtin::Bind) => bind::bind(args),
            Directive::Builtin(Builtin::On) => on::on(args),
            Directive::Builtin(Builtin::Text) => text::text(args),
            Directive::Builtin(Builtin::Html) => html::html(args),
            Directive::Builtin(Builtin::Show) => show::show(args),
            Directive::Builtin(Builtin::Model) => model::model(args),
            Directive::Builtin(Builtin::Effect) => effect::effect(args),
            Directive::Builtin(Builtin::Ref) => refs::reference(args),
            Directive::Custom(handler) => handler(args),
        }
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Builtin(builtin) => f.debug_tuple("Builtin").field(builtin).finish(),
            Directive::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Everything a handler needs to bind one attribute.
#[derive(Clone)]
pub struct DirectiveArgs {
    /// Argument suffix: `data-count` in `:data-count`, `click` in `@click`.
    pub arg: Option<String>,
    /// Raw expression source.
    pub exp: String,
    /// The element or text node carrying the directive.
    pub node: NodeId,
    /// The owning component instance.
    pub context: Arc<ComponentContext>,
    pub store: Store,
}

impl DirectiveArgs {
    /// The evaluation scope for this binding.
    pub fn scope(&self) -> Scope {
        Scope::new(&self.store)
            .with_context(&self.context)
            .with_node(self.node)
    }

    /// Evaluate the directive's expression.
    pub fn get(&self) -> Value {
        self.get_with(&self.exp)
    }

    /// Evaluate another expression in this directive's scope.
    pub fn get_with(&self, src: &str) -> Value {
        self.context.evaluator().evaluate(src, &self.scope())
    }

    /// Evaluate the directive's expression, keeping the error.
    pub fn try_get(&self) -> Result<Value, EvalError> {
        self.context.evaluator().try_evaluate(&self.exp, &self.scope())
    }

    /// Assign `value` to the directive's expression, which must be an
    /// assignable target such as a store field.
    pub fn assign(&self, value: Value) -> Result<(), EvalError> {
        let src = format!("{} = $value", self.exp);
        let scope = self.scope().with_local("$value", value);
        self.context.evaluator().try_evaluate(&src, &scope).map(drop)
    }

    /// Create an effect owned by the directive's component.
    pub fn effect<F, R>(&self, callback: F) -> Effect
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        self.context.effect(callback)
    }

    pub fn document(&self) -> &Document {
        self.context.document()
    }
}

impl fmt::Debug for DirectiveArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveArgs")
            .field("arg", &self.arg)
            .field("exp", &self.exp)
            .field("node", &self.node)
            .finish()
    }
}

/// Name to handler table.
///
/// Cloning yields a handle to the same table.
#[derive(Clone)]
pub struct DirectiveRegistry {
    handlers: Arc<RwLock<IndexMap<String, Directive>>>,
}

impl DirectiveRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// A registry seeded with every [`Builtin`].
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for builtin in Builtin::ALL {
            registry.register(builtin.name(), Directive::Builtin(builtin));
        }
        registry
    }

    /// Add or replace a handler, returning the one it replaced.
    pub fn register(&self, name: impl Into<String>, directive: Directive) -> Option<Directive> {
        let name = name.into();
        trace!(directive = %name, "directive registered");
        self.handlers.write().insert(name, directive)
    }

    pub fn get(&self, name: &str) -> Option<Directive> {
        self.handlers.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Split an attribute name into a registry name and argument.
///
/// Returns `None` for attributes that are not directive syntax.
pub fn resolve_name(attribute: &str) -> Option<(String, Option<String>)> {
    if let Some(arg) = attribute.strip_prefix(':') {
        return Some(("bind".into(), Some(arg.to_string())));
    }
    if let Some(arg) = attribute.strip_prefix('@') {
        return Some(("on".into(), Some(arg.to_string())));
    }
    if let Some(arg) = attribute.strip_prefix("x-bind:") {
        return Some(("bind".into(), Some(arg.to_string())));
    }
    if let Some(arg) = attribute.strip_prefix("x-on:") {
        return Some(("on".into(), Some(arg.to_string())));
    }
    let rest = attribute.strip_prefix("x-")?;
    match rest.split_once(':') {
        Some((name, arg)) => Some((name.to_string(), Some(arg.to_string()))),
        None => Some((rest.to_string(), None)),
    }
}

/// Dispatch one directive attribute (or synthetic `x-text` binding) on
/// `node`.
///
/// Returns the registry name of the handler that ran, or `None` when the
/// attribute is not a registered directive.
pub fn process_directive(
    node: NodeId,
    attribute: &str,
    exp: &str,
    store: &Store,
    context: &Arc<ComponentContext>,
) -> Option<String> {
    let (name, arg) = resolve_name(attribute)?;
    let Some(directive) = context.runtime().directives().get(&name) else {
        trace!(attribute, "no directive registered");
        return None;
    };

    debug!(directive = %name, arg = ?arg, exp, node = node.raw(), "binding directive");
    let args = DirectiveArgs {
        arg,
        exp: exp.to_string(),
        node,
        context: context.clone(),
        store: store.clone(),
    };
    if let Some(cleanup) = directive.apply(&args) {
        context.add_cleanup(cleanup);
    }
    Some(name)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Event;
    use crate::runtime::Runtime;
    use std::sync::atomic::{AtomicI32, Ordering};

    pub(super) struct Fixture {
        pub runtime: Runtime,
        pub store: Store,
        pub context: Arc<ComponentContext>,
    }

    impl Fixture {
        pub fn new(fields: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
            let runtime = Runtime::new();
            let store = Store::reactive(runtime.scheduler(), fields);
            let document = runtime.document();
            let element = document.create_element("x-test");
            document.append_child(document.body(), element).unwrap();
            let context = ComponentContext::new(&runtime, element, &store);
            Self {
                runtime,
                store,
                context,
            }
        }

        /// Parse `markup` into the component element and return the first
        /// top-level node.
        pub fn mount(&self, markup: &str) -> NodeId {
            let document = self.runtime.document();
            let fragment = document.parse_fragment(markup).unwrap();
            let first = document.children(fragment)[0];
            document.append_child(self.context.element(), fragment).unwrap();
            first
        }

        pub fn apply(&self, node: NodeId, attribute: &str, exp: &str) -> Option<String> {
            process_directive(node, attribute, exp, &self.store, &self.context)
        }

        pub fn document(&self) -> &Document {
            self.runtime.document()
        }

        pub fn flush(&self) {
            self.runtime.scheduler().flush();
        }
    }

    #[test]
    fn resolves_attribute_names() {
        assert_eq!(resolve_name(":title"), Some(("bind".into(), Some("title".into()))));
        assert_eq!(resolve_name("@click"), Some(("on".into(), Some("click".into()))));
        assert_eq!(resolve_name("x-bind:href"), Some(("bind".into(), Some("href".into()))));
        assert_eq!(resolve_name("x-on:input"), Some(("on".into(), Some("input".into()))));
        assert_eq!(resolve_name("x-text"), Some(("text".into(), None)));
        assert_eq!(resolve_name("x-tooltip:top"), Some(("tooltip".into(), Some("top".into()))));
        assert_eq!(resolve_name("class"), None);
    }

    #[test]
    fn registry_starts_with_builtins_and_can_be_overridden() {
        let registry = DirectiveRegistry::with_builtins();
        for builtin in Builtin::ALL {
            assert!(registry.contains(builtin.name()));
        }

        let previous = registry.register("text", Directive::custom(|_| None));
        assert!(matches!(previous, Some(Directive::Builtin(Builtin::Text))));
        assert!(matches!(registry.get("text"), Some(Directive::Custom(_))));
    }

    #[test]
    fn unknown_directives_are_ignored() {
        let fixture = Fixture::new([]);
        let node = fixture.mount("<div></div>");
        assert_eq!(fixture.apply(node, "x-unknown", "1"), None);
        assert_eq!(fixture.apply(node, "title", "1"), None);
        assert_eq!(fixture.context.effect_count(), 0);
    }

    #[test]
    fn custom_directive_cleanup_joins_the_context() {
        let fixture = Fixture::new([("label", Value::from("hi"))]);
        let node = fixture.mount("<div></div>");
        let cleaned = Arc::new(AtomicI32::new(0));
        let seen = Arc::new(parking_lot::Mutex::new(None));

        fixture.runtime.directives().register(
            "tooltip",
            Directive::custom({
                let (cleaned, seen) = (cleaned.clone(), seen.clone());
                move |args| {
                    *seen.lock() = Some((args.arg.clone(), args.get()));
                    let cleaned = cleaned.clone();
                    Some(Cleanup::new(move || {
                        cleaned.fetch_add(1, Ordering::SeqCst);
                    }))
                }
            }),
        );

        assert_eq!(fixture.apply(node, "x-tooltip:top", "label"), Some("tooltip".into()));
        assert_eq!(
            *seen.lock(),
            Some((Some("top".to_string()), Value::from("hi")))
        );
        assert_eq!(fixture.context.cleanup_count(), 1);

        fixture.context.dispose();
        fixture.context.dispose();
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn assign_writes_through_the_expression() {
        let fixture = Fixture::new([("name", Value::from(""))]);
        let node = fixture.mount("<input>");
        let args = DirectiveArgs {
            arg: None,
            exp: "name".into(),
            node,
            context: fixture.context.clone(),
            store: fixture.store.clone(),
        };
        args.assign(Value::from("Ada")).unwrap();
        assert_eq!(fixture.store.get_untracked("name"), Value::from("Ada"));
        assert!(fixture.document().dispatch_event(Event::new("input", node)) == 0);
    }
}
