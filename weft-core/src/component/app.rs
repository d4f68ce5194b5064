//! Application bootstrap.
//!
//! An app is a store description plus a set of named component factories.
//! Mounting it on a [`Runtime`] creates the shared store, defines one custom
//! element per component and keeps the document's elements in step with
//! those definitions:
//!
//! - a defined element that connects is constructed
//! - a constructed element that disconnects is disposed
//!
//! Elements already in the document when the app mounts are constructed in
//! document order.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use super::definition::{
    construct, tag_name, Component, ComponentArgs, ComponentDefinition, ComponentFactory,
};
use crate::config::AppConfig;
use crate::dom::{Document, DocumentObserver, NodeId, NodeType};
use crate::error::{EvalError, SetupError};
use crate::runtime::{Runtime, WeakRuntime};
use crate::store::Store;
use crate::value::{Function, Value};

type Factory = Arc<ComponentFactory>;

/// Collects the fields, methods and components of an app.
#[derive(Default)]
pub struct AppBuilder {
    fields: IndexMap<String, Value>,
    components: IndexMap<String, Factory>,
    config: AppConfig,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reactive store field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// A store method.
    pub fn method<F>(mut self, name: &str, call: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.fields
            .insert(name.to_string(), Value::Function(Function::new(name, call)));
        self
    }

    /// A component, named in PascalCase: `TodoItem` defines `<todo-item>`.
    pub fn component<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(ComponentArgs) -> Component + Send + Sync + 'static,
    {
        self.components.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate component names and derive their tags.
    pub fn build(self) -> Result<App, SetupError> {
        let mut components = IndexMap::with_capacity(self.components.len());
        for (name, factory) in self.components {
            if !name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                return Err(SetupError::InvalidComponentName(name));
            }
            let tag = tag_name(&name, self.config.prefix.as_deref());
            if components.contains_key(&tag) {
                return Err(SetupError::DuplicateTag(tag));
            }
            components.insert(tag, factory);
        }

        Ok(App {
            fields: self.fields,
            components,
            config: self.config,
        })
    }
}

/// A validated app, ready to mount.
pub struct App {
    fields: IndexMap<String, Value>,
    /// Tag to factory.
    components: IndexMap<String, Factory>,
    config: AppConfig,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Tags this app defines, in declaration order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Define every component on `runtime` and construct the matching
    /// elements already in the document. Returns the app's store.
    ///
    /// Fails without defining anything when one of the tags is taken.
    pub fn mount(&self, runtime: &Runtime) -> Result<Store, SetupError> {
        if let Some(tag) = self.tags().find(|tag| runtime.is_defined(tag)) {
            return Err(SetupError::DuplicateTag(tag.to_string()));
        }

        let store = Store::reactive(
            runtime.scheduler(),
            self.fields.iter().map(|(k, v)| (k.clone(), v.clone())),
        );
        for (tag, factory) in &self.components {
            let factory = factory.clone();
            let definition = ComponentDefinition::new(tag.clone(), move |args| factory(args))
                .with_store(store.clone())
                .with_dev_warnings(self.config.dev_warnings);
            runtime.define(definition)?;
        }

        if runtime.claim_observer() {
            runtime.document().observe(Arc::new(Upgrader {
                runtime: runtime.downgrade(),
            }));
        }

        let document = runtime.document();
        let mut constructed = 0;
        for node in document.descendants(document.body()) {
            if upgrade(runtime, node).is_some() {
                constructed += 1;
            }
        }

        info!(
            components = self.components.len(),
            constructed,
            "app mounted"
        );
        Ok(store)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("components", &self.tags().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// Construct `node` when it is a connected, defined, never-constructed
/// element.
pub(crate) fn upgrade(runtime: &Runtime, node: NodeId) -> Option<Arc<super::ComponentContext>> {
    let document = runtime.document();
    if document.node_type(node) != Some(NodeType::Element) || !document.is_connected(node) {
        return None;
    }
    let definition = runtime.definition(&document.tag_name(node)?)?;
    construct(runtime, node, &definition)
}

/// Keeps constructed instances in step with the connected tree.
struct Upgrader {
    runtime: WeakRuntime,
}

impl DocumentObserver for Upgrader {
    fn connected(&self, _document: &Document, node: NodeId) {
        if let Some(runtime) = self.runtime.upgrade() {
            upgrade(&runtime, node);
        }
    }

    fn disconnected(&self, _document: &Document, node: NodeId) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        if let Some(instance) = runtime.instance(node) {
            debug!(element = node.raw(), "instance disconnected");
            instance.dispose();
        }
    }

    fn dropped(&self, _document: &Document, node: NodeId) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.forget(node);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
