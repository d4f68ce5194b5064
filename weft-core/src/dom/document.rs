//! In-memory document.
//!
//! The document owns every node in an arena keyed by [`NodeId`]. All
//! mutation happens in place; there is no second tree to reconcile. Handles
//! are cheap clones sharing one arena.
//!
//! Locks are never held while user code runs: event listeners and
//! observers are collected under the lock and invoked after releasing it, so
//! they are free to mutate the document.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::events::{AbortSignal, Event, Listener, ListenerId};
use super::node::{is_void, NodeData, NodeId, NodeKind, NodeType};
use super::parser::{self, escape_attribute, escape_text};
use super::selector::Selector;
use crate::error::DomError;
use crate::value::Value;

/// Receives notifications when elements enter or leave the connected tree.
pub trait DocumentObserver: Send + Sync {
    fn connected(&self, document: &Document, node: NodeId);
    fn disconnected(&self, document: &Document, node: NodeId);

    /// `node` was an element and has been freed. Its id is dead.
    fn dropped(&self, _document: &Document, _node: NodeId) {}
}

/// Node arena.
#[derive(Default)]
pub(crate) struct Tree {
    nodes: HashMap<NodeId, NodeData>,
}

impl Tree {
    pub fn insert(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, data);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(&id)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(&id)
    }

    /// Append a detached node. Callers guarantee validity.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(data) = self.get_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.get_mut(parent) {
            data.children.push(child);
        }
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.get_mut(child).and_then(|data| data.parent.take()) else {
            return;
        };
        if let Some(data) = self.get_mut(parent) {
            data.children.retain(|c| *c != child);
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.get(node).and_then(|data| data.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Pre-order traversal including `root`. Template contents are inert and
    /// never entered.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(data) = self.get(id) else { continue };
            out.push(id);
            if data.tag() == Some("template") {
                continue;
            }
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }

    /// Every node under `root`, template contents included.
    fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(data) = self.get(id) else { continue };
            out.push(id);
            stack.extend(data.children.iter().copied());
        }
        out
    }

    /// Detach `root` and drop it with everything beneath it.
    fn free(&mut self, root: NodeId) -> Vec<(NodeId, NodeData)> {
        self.detach(root);
        self.subtree(root)
            .into_iter()
            .filter_map(|id| self.nodes.remove(&id).map(|data| (id, data)))
            .collect()
    }

    fn elements_in(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(|d| d.node_type() == NodeType::Element))
            .collect()
    }

    fn clone_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        let data = self.get(id)?;
        let kind = match &data.kind {
            NodeKind::Element(el) => {
                let mut copy = el.clone();
                copy.properties.clear();
                NodeKind::Element(copy)
            }
            other => other.clone(),
        };
        let children = data.children.clone();
        let copy = self.insert(NodeData::new(kind));
        for child in children {
            if let Some(child_copy) = self.clone_subtree(child) {
                self.attach(copy, child_copy);
            }
        }
        Some(copy)
    }

    fn text_content(&self, id: NodeId, out: &mut String) {
        let Some(data) = self.get(id) else { return };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(_) => {}
            _ => {
                for child in &data.children {
                    self.text_content(*child, out);
                }
            }
        }
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let Some(data) = self.get(id) else { return };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Fragment => {
                for child in &data.children {
                    self.serialize(*child, out);
                }
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attributes {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attribute(value));
                        out.push('"');
                    }
                }
                if !el.style.is_empty() {
                    let style: Vec<String> =
                        el.style.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    out.push_str(" style=\"");
                    out.push_str(&escape_attribute(&style.join("; ")));
                    out.push('"');
                }
                out.push('>');
                if is_void(&el.tag) {
                    return;
                }
                for child in &data.children {
                    self.serialize(*child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

struct ListenerEntry {
    node: NodeId,
    kind: String,
    handler: Listener,
}

struct DocumentInner {
    tree: RwLock<Tree>,
    body: NodeId,
    listeners: Mutex<IndexMap<ListenerId, ListenerEntry>>,
    observers: RwLock<Vec<Arc<dyn DocumentObserver>>>,
}

/// Shared handle to an in-memory document.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    /// Create a document with an empty `body`.
    pub fn new() -> Self {
        let mut tree = Tree::default();
        let body = tree.insert(NodeData::element("body"));
        Self {
            inner: Arc::new(DocumentInner {
                tree: RwLock::new(tree),
                body,
                listeners: Mutex::new(IndexMap::new()),
                observers: RwLock::new(Vec::new()),
            }),
        }
    }

    /// The root of the connected tree.
    pub fn body(&self) -> NodeId {
        self.inner.body
    }

    /// Register a connect/disconnect observer.
    pub fn observe(&self, observer: Arc<dyn DocumentObserver>) {
        self.inner.observers.write().push(observer);
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.tree.write().insert(NodeData::element(tag))
    }

    pub fn create_text(&self, data: &str) -> NodeId {
        self.inner
            .tree
            .write()
            .insert(NodeData::new(NodeKind::Text(data.to_string())))
    }

    pub fn create_comment(&self, data: &str) -> NodeId {
        self.inner
            .tree
            .write()
            .insert(NodeData::new(NodeKind::Comment(data.to_string())))
    }

    pub fn create_fragment(&self) -> NodeId {
        self.inner.tree.write().insert(NodeData::new(NodeKind::Fragment))
    }

    /// Parse markup into a detached fragment.
    pub fn parse_fragment(&self, markup: &str) -> Result<NodeId, DomError> {
        let mut tree = self.inner.tree.write();
        let roots = parser::parse_fragment(&mut tree, markup)?;
        let fragment = tree.insert(NodeData::new(NodeKind::Fragment));
        for root in roots {
            tree.attach(fragment, root);
        }
        Ok(fragment)
    }

    /// Deep-copy a node. The copy is detached; live properties and listeners
    /// are not copied.
    pub fn clone_subtree(&self, node: NodeId) -> Result<NodeId, DomError> {
        self.inner
            .tree
            .write()
            .clone_subtree(node)
            .ok_or(DomError::NodeNotFound(node))
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub fn exists(&self, node: NodeId) -> bool {
        self.inner.tree.read().get(node).is_some()
    }

    pub fn node_type(&self, node: NodeId) -> Option<NodeType> {
        self.inner.tree.read().get(node).map(NodeData::node_type)
    }

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.inner.tree.read().get(node)?.tag().map(str::to_string)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.tree.read().get(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .tree
            .read()
            .get(node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.tree.read().is_inclusive_ancestor(ancestor, node)
    }

    /// Whether `node` is attached under `body`.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.inner.body, node)
    }

    /// Pre-order list of `root` and its descendants, not entering
    /// `<template>` contents.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        self.inner.tree.read().descendants(root)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end). Inserting a
    /// fragment moves its children.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let (removed, inserted, freed) = {
            let mut tree = self.inner.tree.write();
            let parent_data = tree.get(parent).ok_or(DomError::NodeNotFound(parent))?;
            if !parent_data.is_container() {
                return Err(DomError::Hierarchy {
                    parent,
                    child,
                    reason: "parent cannot have children",
                });
            }
            if let Some(reference) = reference {
                if tree.get(reference).and_then(|d| d.parent) != Some(parent) {
                    return Err(DomError::Hierarchy {
                        parent,
                        child,
                        reason: "reference node is not a child of parent",
                    });
                }
            }
            let child_data = tree.get(child).ok_or(DomError::NodeNotFound(child))?;
            if tree.is_inclusive_ancestor(child, parent) {
                return Err(DomError::Hierarchy {
                    parent,
                    child,
                    reason: "node would become its own ancestor",
                });
            }

            let is_fragment = child_data.node_type() == NodeType::Fragment;
            let nodes = if is_fragment {
                let moved = child_data.children.clone();
                for node in &moved {
                    tree.detach(*node);
                }
                moved
            } else {
                vec![child]
            };

            let body = self.inner.body;
            let mut removed = Vec::new();
            for node in &nodes {
                if tree.get(*node).and_then(|d| d.parent).is_some()
                    && tree.is_inclusive_ancestor(body, *node)
                {
                    removed.extend(tree.elements_in(*node));
                }
                tree.detach(*node);
            }

            for node in &nodes {
                if let Some(data) = tree.get_mut(*node) {
                    data.parent = Some(parent);
                }
            }
            if let Some(data) = tree.get_mut(parent) {
                let index = reference
                    .and_then(|r| data.children.iter().position(|c| *c == r))
                    .unwrap_or(data.children.len());
                data.children.splice(index..index, nodes.iter().copied());
            }

            let inserted = if tree.is_inclusive_ancestor(body, parent) && !is_inert(&tree, parent) {
                nodes.iter().flat_map(|n| tree.elements_in(*n)).collect()
            } else {
                Vec::new()
            };
            // An emptied fragment has no further use.
            let freed = if is_fragment { tree.free(child) } else { Vec::new() };
            (removed, inserted, freed)
        };

        self.release(freed);
        self.notify_disconnected(&removed);
        self.notify_connected(&inserted);
        Ok(())
    }

    /// Remove `node` from its parent. Removing a detached node is a no-op.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let removed = {
            let mut tree = self.inner.tree.write();
            let data = tree.get(node).ok_or(DomError::NodeNotFound(node))?;
            if data.parent.is_none() {
                return Ok(());
            }
            let removed = if tree.is_inclusive_ancestor(self.inner.body, node) {
                tree.elements_in(node)
            } else {
                Vec::new()
            };
            tree.detach(node);
            removed
        };
        self.notify_disconnected(&removed);
        Ok(())
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::Hierarchy {
                parent,
                child,
                reason: "node is not a child of parent",
            });
        }
        self.remove(child)
    }

    /// Replace all children of `node` with `children` (fragments expand).
    ///
    /// Old children that are not among `children` are freed.
    pub fn replace_children(&self, node: NodeId, children: &[NodeId]) -> Result<(), DomError> {
        for old in self.children(node) {
            self.remove(old)?;
            if !children.contains(&old) {
                self.free(old);
            }
        }
        for child in children {
            self.append_child(node, *child)?;
        }
        Ok(())
    }

    /// Remove `node` from its parent and free it with its whole subtree.
    /// Returns the number of nodes freed. The freed ids are dead: lookups
    /// fail and their listeners are gone.
    pub fn dispose_node(&self, node: NodeId) -> Result<usize, DomError> {
        if node == self.inner.body {
            return Err(DomError::DisposeBody);
        }
        self.remove(node)?;
        Ok(self.free(node))
    }

    /// Number of live nodes in the arena, `body` included.
    pub fn node_count(&self) -> usize {
        self.inner.tree.read().nodes.len()
    }

    fn free(&self, node: NodeId) -> usize {
        let freed = self.inner.tree.write().free(node);
        self.release(freed)
    }

    /// Drop listeners of freed nodes and tell observers about freed
    /// elements.
    fn release(&self, freed: Vec<(NodeId, NodeData)>) -> usize {
        if freed.is_empty() {
            return 0;
        }
        let ids: HashSet<NodeId> = freed.iter().map(|(id, _)| *id).collect();
        self.inner
            .listeners
            .lock()
            .retain(|_, entry| !ids.contains(&entry.node));

        let observers = self.observers();
        for (id, data) in &freed {
            if data.node_type() == NodeType::Element {
                for observer in &observers {
                    observer.dropped(self, *id);
                }
            }
        }
        trace!(freed = ids.len(), "nodes freed");
        ids.len()
    }

    // ------------------------------------------------------------------
    // Attributes, style, properties
    // ------------------------------------------------------------------

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .tree
            .read()
            .get(node)?
            .as_element()?
            .attributes
            .get(name)
            .cloned()
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Attributes in document order.
    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.inner
            .tree
            .read()
            .get(node)
            .and_then(NodeData::as_element)
            .map(|el| el.attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.inner.tree.write();
        let el = tree
            .get_mut(node)
            .and_then(NodeData::as_element_mut)
            .ok_or(DomError::NodeNotFound(node))?;
        el.attributes.insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .tree
            .write()
            .get_mut(node)?
            .as_element_mut()?
            .attributes
            .shift_remove(name)
    }

    /// Inline style property.
    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.inner
            .tree
            .read()
            .get(node)?
            .as_element()?
            .style
            .get(property)
            .cloned()
    }

    /// Set an inline style property; `None` or an empty value removes it.
    pub fn set_style(&self, node: NodeId, property: &str, value: Option<&str>) -> Result<(), DomError> {
        let mut tree = self.inner.tree.write();
        let el = tree
            .get_mut(node)
            .and_then(NodeData::as_element_mut)
            .ok_or(DomError::NodeNotFound(node))?;
        match value {
            Some(v) if !v.is_empty() => {
                el.style.insert(property.to_string(), v.to_string());
            }
            _ => {
                el.style.shift_remove(property);
            }
        }
        Ok(())
    }

    /// Read a live property.
    ///
    /// Unwritten `value` falls back to the `value` attribute (or `""`);
    /// unwritten `checked`, `selected`, `multiple` and `disabled` fall back
    /// to attribute presence.
    pub fn property(&self, node: NodeId, name: &str) -> Value {
        let tree = self.inner.tree.read();
        let Some(el) = tree.get(node).and_then(NodeData::as_element) else {
            return Value::Undefined;
        };
        if let Some(value) = el.properties.get(name) {
            return value.clone();
        }
        match name {
            "value" => Value::from(el.attributes.get("value").cloned().unwrap_or_default()),
            "checked" | "selected" | "multiple" | "disabled" => {
                Value::Bool(el.attributes.contains_key(name))
            }
            "type" => Value::from(el.attributes.get("type").cloned().unwrap_or_else(|| "text".into())),
            _ => Value::Undefined,
        }
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: impl Into<Value>) -> Result<(), DomError> {
        let mut tree = self.inner.tree.write();
        let el = tree
            .get_mut(node)
            .and_then(NodeData::as_element_mut)
            .ok_or(DomError::NodeNotFound(node))?;
        el.properties.insert(name.to_string(), value.into());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Text and markup
    // ------------------------------------------------------------------

    /// Data of a text or comment node.
    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.inner.tree.read().get(node)?.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text.clone()),
            _ => None,
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.inner.tree.read().text_content(node, &mut out);
        out
    }

    /// Set text content: text nodes get new data, containers get their
    /// children replaced by one text node.
    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        {
            let mut tree = self.inner.tree.write();
            let data = tree.get_mut(node).ok_or(DomError::NodeNotFound(node))?;
            if let NodeKind::Text(existing) | NodeKind::Comment(existing) = &mut data.kind {
                *existing = text.to_string();
                return Ok(());
            }
        }
        let replacement: Vec<NodeId> = if text.is_empty() {
            Vec::new()
        } else {
            vec![self.create_text(text)]
        };
        self.replace_children(node, &replacement)
    }

    /// Replace the children of `node` with parsed markup.
    pub fn set_inner_html(&self, node: NodeId, markup: &str) -> Result<(), DomError> {
        let fragment = self.parse_fragment(markup)?;
        self.replace_children(node, &[fragment])
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let tree = self.inner.tree.read();
        let mut out = String::new();
        if let Some(data) = tree.get(node) {
            for child in &data.children {
                tree.serialize(*child, &mut out);
            }
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.inner.tree.read().serialize(node, &mut out);
        out
    }

    // ------------------------------------------------------------------
    // Selectors
    // ------------------------------------------------------------------

    /// First element under `root` (excluding `root`) matching `selector`.
    ///
    /// Fails when `selector` is not a supported selector.
    pub fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        Ok(self.query_selector_all(root, selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        let tree = self.inner.tree.read();
        Ok(tree
            .elements_in(root)
            .into_iter()
            .filter(|id| *id != root && selector.matches(&tree, *id))
            .collect())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Register a listener that lives until `signal` aborts.
    ///
    /// Returns `None` when the signal has already aborted.
    pub fn add_event_listener<F>(
        &self,
        node: NodeId,
        kind: &str,
        handler: F,
        signal: &AbortSignal,
    ) -> Option<ListenerId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if signal.is_aborted() {
            return None;
        }
        let id = ListenerId::new();
        self.inner.listeners.lock().insert(
            id,
            ListenerEntry {
                node,
                kind: kind.to_string(),
                handler: Arc::new(handler),
            },
        );

        let weak: Weak<DocumentInner> = Arc::downgrade(&self.inner);
        let registered = signal.on_abort(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().shift_remove(&id);
            }
        });
        if !registered {
            self.inner.listeners.lock().shift_remove(&id);
            return None;
        }
        trace!(node = node.raw(), kind, "listener added");
        Some(id)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.lock().shift_remove(&id).is_some()
    }

    /// Number of listeners registered on `node`.
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.inner
            .listeners
            .lock()
            .values()
            .filter(|entry| entry.node == node)
            .count()
    }

    /// Dispatch `event` at its target, bubbling to ancestors. Returns how
    /// many listeners ran.
    pub fn dispatch_event(&self, event: Event) -> usize {
        let mut path = vec![event.target];
        {
            let tree = self.inner.tree.read();
            let mut current = tree.get(event.target).and_then(|d| d.parent);
            while let Some(id) = current {
                path.push(id);
                current = tree.get(id).and_then(|d| d.parent);
            }
        }

        let mut invoked = 0;
        for node in path {
            let handlers: Vec<Listener> = self
                .inner
                .listeners
                .lock()
                .values()
                .filter(|entry| entry.node == node && entry.kind == event.kind)
                .map(|entry| entry.handler.clone())
                .collect();
            let mut current = event.clone();
            current.current_target = node;
            for handler in handlers {
                handler(&current);
                invoked += 1;
            }
        }
        invoked
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    fn observers(&self) -> Vec<Arc<dyn DocumentObserver>> {
        self.inner.observers.read().clone()
    }

    fn notify_connected(&self, nodes: &[NodeId]) {
        if nodes.is_empty() {
            return;
        }
        let observers = self.observers();
        for node in nodes {
            for observer in &observers {
                observer.connected(self, *node);
            }
        }
    }

    fn notify_disconnected(&self, nodes: &[NodeId]) {
        if nodes.is_empty() {
            return;
        }
        let observers = self.observers();
        for node in nodes {
            for observer in &observers {
                observer.disconnected(self, *node);
            }
        }
    }
}

/// Whether `node` sits inside a `<template>`.
fn is_inert(tree: &Tree, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        let Some(data) = tree.get(id) else { return false };
        if data.tag() == Some("template") {
            return true;
        }
        current = data.parent;
    }
    false
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.inner.tree.read().nodes.len())
            .field("listeners", &self.inner.listeners.lock().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::AbortController;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mount(doc: &Document, markup: &str) -> NodeId {
        let fragment = doc.parse_fragment(markup).unwrap();
        let first = doc.children(fragment)[0];
        doc.append_child(doc.body(), fragment).unwrap();
        first
    }

    #[test]
    fn append_and_remove() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let text = doc.create_text("hi");
        doc.append_child(div, text).unwrap();
        doc.append_child(doc.body(), div).unwrap();

        assert!(doc.is_connected(text));
        assert_eq!(doc.text_content(div), "hi");

        doc.remove(div).unwrap();
        assert!(!doc.is_connected(div));
        assert_eq!(doc.parent(text), Some(div));
    }

    #[test]
    fn cycles_are_rejected() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();
        assert!(doc.append_child(inner, outer).is_err());
    }

    #[test]
    fn fragments_move_their_children() {
        let doc = Document::new();
        let fragment = doc.parse_fragment("<a></a><b></b>").unwrap();
        doc.append_child(doc.body(), fragment).unwrap();
        assert!(!doc.exists(fragment));
        assert_eq!(doc.inner_html(doc.body()), "<a></a><b></b>");
    }

    #[test]
    fn replaced_children_are_freed() {
        let doc = Document::new();
        let p = mount(&doc, "<p>start</p>");
        let first_text = doc.children(p)[0];
        let baseline = doc.node_count();

        for i in 0..100 {
            doc.set_text_content(p, &i.to_string()).unwrap();
        }
        assert_eq!(doc.node_count(), baseline);
        assert!(!doc.exists(first_text));

        doc.set_inner_html(p, "<i>a</i><b>b</b>").unwrap();
        doc.set_inner_html(p, "<i>c</i>").unwrap();
        assert_eq!(doc.node_count(), baseline + 1);
        assert_eq!(doc.inner_html(p), "<i>c</i>");
    }

    #[test]
    fn replace_children_keeps_reused_nodes() {
        let doc = Document::new();
        let list = mount(&doc, "<ul><li>a</li><li>b</li></ul>");
        let items = doc.children(list);
        doc.replace_children(list, &[items[1], items[0]]).unwrap();
        assert_eq!(doc.text_content(list), "ba");
        assert!(doc.exists(items[0]) && doc.exists(items[1]));
    }

    #[test]
    fn dispose_node_frees_the_subtree_and_its_listeners() {
        let doc = Document::new();
        let baseline = doc.node_count();
        let section = mount(&doc, "<section><button>go</button><template><b></b></template></section>");
        let button = doc.children(section)[0];
        let controller = AbortController::new();
        doc.add_event_listener(button, "click", |_| {}, controller.signal());

        assert_eq!(doc.dispose_node(section).unwrap(), 5);
        assert_eq!(doc.node_count(), baseline);
        assert!(!doc.exists(button));
        assert_eq!(doc.listener_count(button), 0);
        assert!(doc.dispose_node(section).is_err());
        assert!(matches!(doc.dispose_node(doc.body()), Err(DomError::DisposeBody)));
    }

    #[test]
    fn insert_before_places_node() {
        let doc = Document::new();
        let list = mount(&doc, "<ul><li>b</li></ul>");
        let first = doc.children(list)[0];
        let item = doc.parse_fragment("<li>a</li>").unwrap();
        doc.insert_before(list, item, Some(first)).unwrap();
        assert_eq!(doc.text_content(list), "ab");
    }

    #[test]
    fn text_content_and_serialization() {
        let doc = Document::new();
        let p = mount(&doc, r#"<p class="x">a <b>b</b></p>"#);
        doc.set_style(p, "display", Some("none")).unwrap();
        assert_eq!(doc.outer_html(p), r#"<p class="x" style="display: none">a <b>b</b></p>"#);

        doc.set_text_content(p, "<plain>").unwrap();
        assert_eq!(doc.inner_html(p), "&lt;plain&gt;");
    }

    #[test]
    fn properties_fall_back_to_attributes() {
        let doc = Document::new();
        let input = mount(&doc, r#"<input type="checkbox" value="on" checked>"#);
        assert_eq!(doc.property(input, "value"), Value::from("on"));
        assert_eq!(doc.property(input, "checked"), Value::Bool(true));

        doc.set_property(input, "checked", false).unwrap();
        assert_eq!(doc.property(input, "checked"), Value::Bool(false));
    }

    #[test]
    fn selectors_find_descendants() {
        let doc = Document::new();
        let root = mount(
            &doc,
            r#"<section><template id="row"><li></li></template><ul><li class="item a">1</li><li class="item">2</li></ul></section>"#,
        );
        let items = doc.query_selector_all(root, "ul .item").unwrap();
        assert_eq!(items.len(), 2);
        let template = doc.query_selector(root, "template#row").unwrap();
        assert!(template.is_some());
        assert!(doc.query_selector(root, "<li>").is_err());
    }

    #[test]
    fn aborting_removes_listeners() {
        let doc = Document::new();
        let button = mount(&doc, "<div><button></button></div>");
        let button = doc.children(button)[0];
        let controller = AbortController::new();
        let clicks = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let clicks = clicks.clone();
            doc.add_event_listener(
                button,
                "click",
                move |_| {
                    clicks.fetch_add(1, Ordering::SeqCst);
                },
                controller.signal(),
            );
        }
        assert_eq!(doc.dispatch_event(Event::new("click", button)), 2);

        controller.abort();
        assert_eq!(doc.listener_count(button), 0);
        assert_eq!(doc.dispatch_event(Event::new("click", button)), 0);
        assert_eq!(clicks.load(Ordering::SeqCst), 2);
        assert!(doc
            .add_event_listener(button, "click", |_| {}, controller.signal())
            .is_none());
    }

    #[test]
    fn events_bubble_to_ancestors() {
        let doc = Document::new();
        let outer = mount(&doc, "<div><span></span></div>");
        let inner = doc.children(outer)[0];
        let controller = AbortController::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        doc.add_event_listener(
            outer,
            "ping",
            move |event| log.lock().push((event.target, event.current_target)),
            controller.signal(),
        );

        doc.dispatch_event(Event::new("ping", inner));
        assert_eq!(*seen.lock(), vec![(inner, outer)]);
    }

    struct Recorder {
        connected: Mutex<Vec<String>>,
        disconnected: Mutex<Vec<String>>,
        dropped: Mutex<Vec<NodeId>>,
    }

    impl DocumentObserver for Recorder {
        fn connected(&self, document: &Document, node: NodeId) {
            self.connected.lock().push(document.tag_name(node).unwrap_or_default());
        }

        fn disconnected(&self, document: &Document, node: NodeId) {
            self.disconnected.lock().push(document.tag_name(node).unwrap_or_default());
        }

        fn dropped(&self, _document: &Document, node: NodeId) {
            self.dropped.lock().push(node);
        }
    }

    #[test]
    fn observers_see_connected_elements_in_order() {
        let doc = Document::new();
        let recorder = Arc::new(Recorder {
            connected: Mutex::new(Vec::new()),
            disconnected: Mutex::new(Vec::new()),
            dropped: Mutex::new(Vec::new()),
        });
        doc.observe(recorder.clone());

        let detached = doc.parse_fragment("<main><a></a><template><b></b></template></main>").unwrap();
        let main = doc.children(detached)[0];
        assert!(recorder.connected.lock().is_empty());

        doc.append_child(doc.body(), detached).unwrap();
        assert_eq!(*recorder.connected.lock(), vec!["main", "a", "template"]);

        doc.remove(main).unwrap();
        assert_eq!(*recorder.disconnected.lock(), vec!["main", "a", "template"]);
        assert!(recorder.dropped.lock().is_empty());

        doc.dispose_node(main).unwrap();
        assert_eq!(recorder.dropped.lock().len(), 4);
    }
}
