//! Runtime
//!
//! The runtime bundles what one application shares: the document, the
//! scheduler, the expression evaluator, the directive registry, the custom
//! element definitions and the side table of live component instances.
//!
//! Component instances are looked up by element id rather than referenced
//! from each other, so parent/child relationships never form ownership
//! cycles. An instance leaves the table when it is disposed.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::component::{ComponentContext, ComponentDefinition};
use crate::directives::DirectiveRegistry;
use crate::dom::{Document, NodeId};
use crate::error::SetupError;
use crate::expr::Evaluator;
use crate::reactive::Scheduler;

struct RuntimeInner {
    document: Document,
    scheduler: Scheduler,
    evaluator: Evaluator,
    directives: DirectiveRegistry,
    definitions: RwLock<IndexMap<String, Arc<ComponentDefinition>>>,
    instances: DashMap<NodeId, Arc<ComponentContext>>,
    /// Elements that have been constructed once. Constructed elements are
    /// never upgraded again, even after disposal.
    upgraded: Mutex<HashSet<NodeId>>,
    observing: AtomicBool,
}

/// Shared application runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

/// Non-owning runtime handle held by document observers.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

impl Runtime {
    /// A runtime over a fresh document.
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    pub fn with_document(document: Document) -> Self {
        Self::with_parts(document, Scheduler::new(), Evaluator::new())
    }

    pub fn with_parts(document: Document, scheduler: Scheduler, evaluator: Evaluator) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                document,
                scheduler,
                evaluator,
                directives: DirectiveRegistry::with_builtins(),
                definitions: RwLock::new(IndexMap::new()),
                instances: DashMap::new(),
                upgraded: Mutex::new(HashSet::new()),
                observing: AtomicBool::new(false),
            }),
        }
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.inner.evaluator
    }

    pub fn directives(&self) -> &DirectiveRegistry {
        &self.inner.directives
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.inner))
    }

    /// Claim the right to install the document observer. Returns `true`
    /// exactly once per runtime.
    pub(crate) fn claim_observer(&self) -> bool {
        !self.inner.observing.swap(true, Ordering::AcqRel)
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Register a custom element definition under `tag`.
    pub fn define(&self, definition: ComponentDefinition) -> Result<(), SetupError> {
        let mut definitions = self.inner.definitions.write();
        let tag = definition.tag().to_string();
        if definitions.contains_key(&tag) {
            return Err(SetupError::DuplicateTag(tag));
        }
        debug!(tag = %tag, "custom element defined");
        definitions.insert(tag, Arc::new(definition));
        Ok(())
    }

    pub fn definition(&self, tag: &str) -> Option<Arc<ComponentDefinition>> {
        self.inner.definitions.read().get(tag).cloned()
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.inner.definitions.read().contains_key(tag)
    }

    /// Defined tag names in definition order.
    pub fn defined_tags(&self) -> Vec<String> {
        self.inner.definitions.read().keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    /// The live component instance bound to `element`.
    pub fn instance(&self, element: NodeId) -> Option<Arc<ComponentContext>> {
        self.inner.instances.get(&element).map(|entry| entry.value().clone())
    }

    pub fn instance_count(&self) -> usize {
        self.inner.instances.len()
    }

    /// Whether `node` is a component boundary: a live instance or an
    /// element whose tag is a defined component.
    pub fn is_component(&self, node: NodeId) -> bool {
        if self.inner.instances.contains_key(&node) {
            return true;
        }
        self.inner
            .document
            .tag_name(node)
            .is_some_and(|tag| self.is_defined(&tag))
    }

    /// Mark `element` as constructed. Returns `false` when it already was.
    pub(crate) fn mark_upgraded(&self, element: NodeId) -> bool {
        self.inner.upgraded.lock().insert(element)
    }

    /// Drop everything kept for a freed element.
    pub(crate) fn forget(&self, element: NodeId) {
        self.inner.upgraded.lock().remove(&element);
        if let Some(instance) = self.instance(element) {
            instance.dispose();
        }
    }

    #[cfg(test)]
    pub(crate) fn upgraded_count(&self) -> usize {
        self.inner.upgraded.lock().len()
    }

    pub(crate) fn register_instance(&self, context: Arc<ComponentContext>) {
        self.inner.instances.insert(context.element(), context);
    }

    pub(crate) fn remove_instance(&self, element: NodeId) {
        self.inner.instances.remove(&element);
    }

    /// Construct `element` if it is a connected, defined element that has
    /// not been constructed before.
    pub fn upgrade(&self, element: NodeId) -> Option<Arc<ComponentContext>> {
        crate::component::upgrade(self, element)
    }

    /// Dispose every live instance and stop the scheduler.
    pub fn dispose(&self) {
        let instances: Vec<Arc<ComponentContext>> = self
            .inner
            .instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for instance in instances {
            instance.dispose();
        }
        self.inner.scheduler.dispose();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("document", &self.inner.document)
            .field("definitions", &self.defined_tags())
            .field("instances", &self.instance_count())
            .finish()
    }
}
