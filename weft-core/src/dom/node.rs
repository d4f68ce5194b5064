//! Document Nodes
//!
//! This module defines the node types stored in a [`Document`](super::Document).

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::value::Value;

/// Unique identifier for a node.
///
/// IDs are process-wide unique, so a node ID doubles as the element identity
/// used by side tables (component instances, refs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Comment,
    Fragment,
}

/// Elements that never have children.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ElementData {
    /// Lowercase local name.
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub style: IndexMap<String, String>,
    /// Live properties such as `value` and `checked` that shadow the
    /// corresponding attributes once written.
    pub properties: IndexMap<String, Value>,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::new(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }))
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Fragment => NodeType::Fragment,
        }
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.as_element().map(|el| el.tag.as_str())
    }

    /// Whether this node may have children.
    pub fn is_container(&self) -> bool {
        match &self.kind {
            NodeKind::Element(el) => !is_void(&el.tag),
            NodeKind::Fragment => true,
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn element_tags_are_lowercased() {
        let node = NodeData::element("DIV");
        assert_eq!(node.tag(), Some("div"));
        assert_eq!(node.node_type(), NodeType::Element);
        assert!(node.is_container());
    }

    #[test]
    fn void_elements_are_not_containers() {
        assert!(!NodeData::element("input").is_container());
        assert!(!NodeData::new(NodeKind::Text("x".into())).is_container());
        assert!(NodeData::new(NodeKind::Fragment).is_container());
    }
}
