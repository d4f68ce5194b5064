//! Component definitions and element construction.
//!
//! # How Construction Works
//!
//! When a defined element connects, it is constructed exactly once:
//!
//! 1. The element is marked upgraded and its context enters the runtime's
//!    instance table.
//! 2. `x-scope` (default `{}`) is evaluated against the store.
//! 3. The factory runs and returns a [`Component`]: members, hooks and an
//!    optional template.
//! 4. The template is resolved and appended to the element. Nested
//!    components inside it are constructed as they connect.
//! 5. The subtree is walked, then the `connected` hook runs.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::context::{ComponentContext, Hook};
use crate::dom::{Document, NodeId};
use crate::error::{DomError, EvalError};
use crate::expr::Scope;
use crate::runtime::Runtime;
use crate::store::Store;
use crate::value::{Function, Value};
use crate::walker::create_walker;

/// Factory signature: called once per constructed element.
pub type ComponentFactory = dyn Fn(ComponentArgs) -> Component + Send + Sync;

/// What a factory receives.
#[derive(Debug, Clone)]
pub struct ComponentArgs {
    /// The element's evaluated `x-scope` attribute.
    pub scope: Value,
    pub element: NodeId,
    pub context: Arc<ComponentContext>,
}

impl ComponentArgs {
    /// A field of the scope object, or `undefined`.
    pub fn prop(&self, name: &str) -> Value {
        self.scope
            .as_object()
            .and_then(|object| object.get(name).cloned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
enum Template {
    /// A selector, falling back to markup when nothing matches.
    Source(String),
    /// A node whose children are cloned into each instance.
    Node(NodeId),
}

/// The parts a factory returns for one element.
#[derive(Default)]
pub struct Component {
    template: Option<Template>,
    connected: Option<Hook>,
    disconnected: Option<Hook>,
    members: IndexMap<String, Value>,
}

impl Component {
    pub fn new() -> Self {
        Self::default()
    }

    /// Template as a selector (looked up in the element, then the
    /// document) or, failing that, as markup.
    pub fn template(mut self, source: impl Into<String>) -> Self {
        self.template = Some(Template::Source(source.into()));
        self
    }

    /// Template taken from an existing node, usually a `<template>`.
    pub fn template_node(mut self, node: NodeId) -> Self {
        self.template = Some(Template::Node(node));
        self
    }

    pub fn on_connected<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&ComponentContext) + Send + 'static,
    {
        let hook: Hook = Box::new(hook);
        self.connected = Some(hook);
        self
    }

    pub fn on_disconnected<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&ComponentContext) + Send + 'static,
    {
        let hook: Hook = Box::new(hook);
        self.disconnected = Some(hook);
        self
    }

    /// A plain member, readable from expressions by name.
    pub fn member(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    /// A callable member.
    pub fn method<F>(self, name: &str, call: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.member(name, Function::new(name, call))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("template", &self.template)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("connected", &self.connected.is_some())
            .field("disconnected", &self.disconnected.is_some())
            .finish()
    }
}

/// A custom element: its tag, its factory and the store its instances
/// bind to.
#[derive(Clone)]
pub struct ComponentDefinition {
    tag: String,
    factory: Arc<ComponentFactory>,
    store: Option<Store>,
    dev_warnings: bool,
}

impl ComponentDefinition {
    pub fn new<F>(tag: impl Into<String>, factory: F) -> Self
    where
        F: Fn(ComponentArgs) -> Component + Send + Sync + 'static,
    {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            factory: Arc::new(factory),
            store: None,
            dev_warnings: true,
        }
    }

    /// Bind instances to `store`. Without one each instance gets an empty
    /// store of its own.
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_dev_warnings(mut self, enabled: bool) -> Self {
        self.dev_warnings = enabled;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("tag", &self.tag)
            .field("dev_warnings", &self.dev_warnings)
            .finish()
    }
}

/// Derive a custom element tag from a component name.
///
/// Each lowercase-or-any character followed by an uppercase one gets a dash
/// between them, the result is lowercased, and names without a dash get an
/// `x-` prefix: `MyElement` becomes `my-element`, `Button` becomes
/// `x-button`, and with prefix `ui` it becomes `ui-button`.
pub fn tag_name(name: &str, prefix: Option<&str>) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut dashed = String::with_capacity(name.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        dashed.push(chars[i]);
        if chars.get(i + 1).is_some_and(char::is_ascii_uppercase) {
            dashed.push('-');
            dashed.push(chars[i + 1]);
            i += 2;
        } else {
            i += 1;
        }
    }

    let tag = match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}-{dashed}"),
        _ => dashed,
    }
    .to_lowercase();

    if tag.contains('-') {
        tag
    } else {
        format!("x-{tag}")
    }
}

/// Construct `element` from `definition`.
///
/// Returns `None` when the element was constructed before.
pub(crate) fn construct(
    runtime: &Runtime,
    element: NodeId,
    definition: &ComponentDefinition,
) -> Option<Arc<ComponentContext>> {
    if !runtime.mark_upgraded(element) {
        return None;
    }

    let document = runtime.document();
    let store = definition
        .store
        .clone()
        .unwrap_or_else(|| Store::empty(runtime.scheduler()));
    let context = ComponentContext::new(runtime, element, &store);
    runtime.register_instance(context.clone());

    let scope_src = document
        .attribute(element, "x-scope")
        .unwrap_or_else(|| "{}".to_string());
    let scope = runtime.evaluator().evaluate(
        &scope_src,
        &Scope::new(&store).with_context(&context).with_node(element),
    );

    let component = (definition.factory)(ComponentArgs {
        scope,
        element,
        context: context.clone(),
    });
    for (name, value) in component.members {
        context.define_member(name, value);
    }
    context.set_hooks(component.connected, component.disconnected);

    if let Some(template) = component.template {
        let attached = resolve_template(document, element, &template, definition.dev_warnings)
            .and_then(|fragment| document.append_child(element, fragment));
        if let Err(err) = attached {
            warn!(tag = %definition.tag, error = %err, "template could not be attached");
        }
    }

    let report = create_walker(&context, &store);
    debug!(
        tag = %definition.tag,
        element = element.raw(),
        bound = report.bound,
        "component constructed"
    );

    context.run_connected();
    Some(context)
}

/// Produce a fresh fragment holding one copy of the template.
fn resolve_template(
    document: &Document,
    element: NodeId,
    template: &Template,
    dev_warnings: bool,
) -> Result<NodeId, DomError> {
    let source = match template {
        Template::Node(node) => return clone_children(document, *node),
        Template::Source(source) => source,
    };

    // Markup rarely parses as a selector; a parse failure means markup.
    let found = document
        .query_selector(element, source)
        .and_then(|found| match found {
            Some(node) => Ok(Some(node)),
            None => document.query_selector(document.body(), source),
        });
    match found {
        Ok(Some(node)) => clone_children(document, node),
        Ok(None) => {
            if dev_warnings {
                warn!(
                    selector = %source,
                    "no element matches the template selector, using it as markup"
                );
            }
            document.parse_fragment(source)
        }
        Err(_) => document.parse_fragment(source),
    }
}

fn clone_children(document: &Document, node: NodeId) -> Result<NodeId, DomError> {
    let fragment = document.create_fragment();
    for child in document.children(node) {
        let copy = document.clone_subtree(child)?;
        document.append_child(fragment, copy)?;
    }
    Ok(fragment)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
