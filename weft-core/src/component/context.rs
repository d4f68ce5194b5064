//! Component Context
//!
//! The owning context of one component instance. Everything a directive
//! sets up for the instance is recorded here so a single [`dispose`] call
//! can tear it down:
//!
//! - effects are disposed (unsubscribed, pending cleanup invoked)
//! - cleanups returned by directives run in registration order
//! - every listener registered against the instance's abort signal is
//!   removed
//!
//! [`dispose`]: ComponentContext::dispose

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::dom::{AbortController, AbortSignal, Document, Event, ListenerId, NodeId};
use crate::error::{DomError, StoreError};
use crate::expr::Evaluator;
use crate::reactive::{Cleanup, Effect, EffectOutput};
use crate::runtime::Runtime;
use crate::store::Store;
use crate::value::Value;

/// Lifecycle hook of a component instance.
pub type Hook = Box<dyn FnOnce(&ComponentContext) + Send>;

#[derive(Default)]
struct Hooks {
    connected: Option<Hook>,
    disconnected: Option<Hook>,
}

pub struct ComponentContext {
    element: NodeId,
    runtime: Runtime,
    store: Store,
    members: RwLock<IndexMap<String, Value>>,
    refs: RwLock<IndexMap<String, NodeId>>,
    effects: Mutex<Vec<Effect>>,
    cleanups: Mutex<Vec<Cleanup>>,
    controller: AbortController,
    hooks: Mutex<Hooks>,
    disposed: AtomicBool,
}

impl ComponentContext {
    /// Create the context for `element`. The context is not registered
    /// with the runtime; construction through an app does that.
    pub fn new(runtime: &Runtime, element: NodeId, store: &Store) -> Arc<Self> {
        Arc::new(Self {
            element,
            runtime: runtime.clone(),
            store: store.clone(),
            members: RwLock::new(IndexMap::new()),
            refs: RwLock::new(IndexMap::new()),
            effects: Mutex::new(Vec::new()),
            cleanups: Mutex::new(Vec::new()),
            controller: AbortController::new(),
            hooks: Mutex::new(Hooks::default()),
            disposed: AtomicBool::new(false),
        })
    }

    /// The custom element this context owns.
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn document(&self) -> &Document {
        self.runtime.document()
    }

    pub fn evaluator(&self) -> &Evaluator {
        self.runtime.evaluator()
    }

    // ------------------------------------------------------------------
    // Owned resources
    // ------------------------------------------------------------------

    /// Create an effect owned by this instance.
    ///
    /// Effects created after disposal are disposed immediately.
    pub fn effect<F, R>(&self, callback: F) -> Effect
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let effect = Effect::new(self.runtime.scheduler(), callback);
        if self.is_disposed() {
            effect.dispose();
        } else {
            self.effects.lock().push(effect.clone());
        }
        effect
    }

    pub fn effect_count(&self) -> usize {
        self.effects.lock().len()
    }

    /// Register a cleanup to run on disposal. After disposal it runs at
    /// once.
    pub fn add_cleanup(&self, cleanup: Cleanup) {
        if self.is_disposed() {
            cleanup.run();
            return;
        }
        self.cleanups.lock().push(cleanup);
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.lock().len()
    }

    /// The signal every listener of this instance is registered against.
    pub fn signal(&self) -> &AbortSignal {
        self.controller.signal()
    }

    // ------------------------------------------------------------------
    // Element helpers
    // ------------------------------------------------------------------

    /// Listen for `kind` events on the element until disposal.
    pub fn listen<F>(&self, kind: &str, handler: F) -> Option<ListenerId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.document()
            .add_event_listener(self.element, kind, handler, self.signal())
    }

    /// Dispatch a `kind` event at `target` (default: the element). Returns
    /// the number of listeners that ran.
    pub fn emit(&self, kind: &str, target: Option<NodeId>) -> usize {
        let target = target.unwrap_or(self.element);
        self.document().dispatch_event(Event::new(kind, target))
    }

    /// First descendant of the element matching `selector`.
    pub fn query(&self, selector: &str) -> Result<Option<NodeId>, DomError> {
        self.document().query_selector(self.element, selector)
    }

    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        self.document().query_selector_all(self.element, selector)
    }

    /// The nearest ancestor component instance.
    pub fn parent(&self) -> Option<Arc<ComponentContext>> {
        let document = self.document();
        let mut current = document.parent(self.element);
        while let Some(node) = current {
            if let Some(instance) = self.runtime.instance(node) {
                return Some(instance);
            }
            current = document.parent(node);
        }
        None
    }

    // ------------------------------------------------------------------
    // Members and store mirroring
    // ------------------------------------------------------------------

    /// A non-reactive member produced by the component factory.
    pub fn member(&self, name: &str) -> Option<Value> {
        self.members.read().get(name).cloned()
    }

    /// Define or replace a member.
    pub fn define_member(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.members.write().insert(name.into(), value.into());
    }

    /// Overwrite an existing member. Returns `false` when there is none.
    pub fn set_member(&self, name: &str, value: Value) -> bool {
        match self.members.write().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.read().keys().cloned().collect()
    }

    /// Read a store field through the instance.
    pub fn get(&self, key: &str) -> Value {
        self.store.get(key)
    }

    /// Write a store field through the instance.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool, StoreError> {
        self.store.set(key, value)
    }

    // ------------------------------------------------------------------
    // Refs
    // ------------------------------------------------------------------

    pub fn set_ref(&self, name: impl Into<String>, node: NodeId) {
        self.refs.write().insert(name.into(), node);
    }

    pub fn ref_node(&self, name: &str) -> Option<NodeId> {
        self.refs.read().get(name).copied()
    }

    pub fn refs(&self) -> IndexMap<String, NodeId> {
        self.refs.read().clone()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub(crate) fn set_hooks(&self, connected: Option<Hook>, disconnected: Option<Hook>) {
        let mut hooks = self.hooks.lock();
        hooks.connected = connected;
        hooks.disconnected = disconnected;
    }

    pub(crate) fn run_connected(&self) {
        let hook = self.hooks.lock().connected.take();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Tear the instance down. Later calls do nothing.
    ///
    /// Order: listeners are aborted, effects disposed, cleanups run in
    /// registration order, then the `disconnected` hook.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.controller.abort();

        let effects = std::mem::take(&mut *self.effects.lock());
        for effect in &effects {
            effect.dispose();
        }

        let cleanups = std::mem::take(&mut *self.cleanups.lock());
        let cleanup_count = cleanups.len();
        for cleanup in cleanups {
            cleanup.run();
        }

        let hook = self.hooks.lock().disconnected.take();
        if let Some(hook) = hook {
            hook(self);
        }

        let members = std::mem::take(&mut *self.members.write());
        drop(members);
        self.refs.write().clear();
        self.runtime.remove_instance(self.element);

        debug!(
            element = self.element.raw(),
            effects = effects.len(),
            cleanups = cleanup_count,
            "component disposed"
        );
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("element", &self.element)
            .field("effects", &self.effect_count())
            .field("cleanups", &self.cleanup_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn setup() -> (Runtime, Store, Arc<ComponentContext>) {
        let runtime = Runtime::new();
        let store = Store::reactive(runtime.scheduler(), [("count", Value::from(0))]);
        let element = runtime.document().create_element("x-counter");
        runtime.document().append_child(runtime.document().body(), element).unwrap();
        let context = ComponentContext::new(&runtime, element, &store);
        (runtime, store, context)
    }

    #[test]
    fn dispose_runs_cleanups_once_in_order() {
        let (_runtime, _store, context) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            context.add_cleanup(Cleanup::new(move || log.lock().push(i)));
        }

        context.dispose();
        context.dispose();
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(context.is_disposed());
    }

    #[test]
    fn dispose_stops_effects_and_listeners() {
        let (runtime, store, context) = setup();
        let runs = Arc::new(AtomicI32::new(0));
        let clicks = Arc::new(AtomicI32::new(0));

        context.effect({
            let (store, runs) = (store.clone(), runs.clone());
            move || {
                store.get("count");
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        context.listen("click", {
            let clicks = clicks.clone();
            move |_| {
                clicks.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(context.emit("click", None), 1);

        context.dispose();
        store.set("count", 1).unwrap();
        runtime.scheduler().flush();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(context.emit("click", None), 0);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn members_and_hooks() {
        let (_runtime, _store, context) = setup();
        context.define_member("label", "hi");
        assert_eq!(context.member("label"), Some(Value::from("hi")));
        assert!(context.set_member("label", Value::from("bye")));
        assert!(!context.set_member("other", Value::Null));

        let seen = Arc::new(AtomicI32::new(0));
        let (a, b) = (seen.clone(), seen.clone());
        let connected: Hook = Box::new(move |_: &ComponentContext| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let disconnected: Hook = Box::new(move |ctx: &ComponentContext| {
            assert!(ctx.is_disposed());
            b.fetch_add(10, Ordering::SeqCst);
        });
        context.set_hooks(Some(connected), Some(disconnected));
        context.run_connected();
        context.run_connected();
        context.dispose();
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn parent_is_found_through_the_side_table() {
        let (runtime, store, outer) = setup();
        runtime.register_instance(outer.clone());
        let document = runtime.document();
        let wrapper = document.create_element("div");
        let inner_el = document.create_element("x-inner");
        document.append_child(wrapper, inner_el).unwrap();
        document.append_child(outer.element(), wrapper).unwrap();

        let inner = ComponentContext::new(&runtime, inner_el, &store);
        let parent = inner.parent().unwrap();
        assert_eq!(parent.element(), outer.element());

        outer.dispose();
        assert!(inner.parent().is_none());
    }

    #[test]
    fn resources_added_after_dispose_are_released() {
        let (_runtime, store, context) = setup();
        context.dispose();

        let ran = Arc::new(AtomicI32::new(0));
        context.add_cleanup(Cleanup::new({
            let ran = ran.clone();
            move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let effect = context.effect(move || {
            store.get("count");
        });
        assert!(effect.is_disposed());
        assert_eq!(context.effect_count(), 0);
    }
}
