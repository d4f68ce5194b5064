//! DOM Walker
//!
//! Binds a component's subtree to its store in one pass.
//!
//! # How the Walk Works
//!
//! ```text
//!   <x-counter>              root: attributes processed
//!     <p :title="t">         element: attributes dispatched, then removed
//!       Count: {{count}}     text: rewritten to  "Count: "+$s(count)
//!     <x-child>              component boundary: skipped with its subtree
//!       ...
//!     <span x-text="n">      element: children owned by the directive
//!       ...                  not walked
//! ```
//!
//! The traversal is pre-order over element and text nodes, driven by an
//! explicit stack. Children are read after their parent has been processed,
//! so a directive that rewrites its element's children is never walked
//! into stale nodes. `<template>` contents are inert and never visited.

use std::sync::Arc;

use tracing::debug;

use crate::component::ComponentContext;
use crate::directives::process_directive;
use crate::dom::NodeType;
use crate::store::Store;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Counters describing one walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkReport {
    /// Element and text nodes visited.
    pub visited: usize,
    /// Directives dispatched, including text interpolations.
    pub bound: usize,
    /// Nested component subtrees skipped.
    pub skipped_components: usize,
}

/// Walk `context`'s element and bind every directive beneath it to `store`.
pub fn create_walker(context: &Arc<ComponentContext>, store: &Store) -> WalkReport {
    let root = context.element();
    let runtime = context.runtime();
    let document = context.document();
    let mut report = WalkReport::default();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        match document.node_type(node) {
            Some(NodeType::Element) => {
                if node != root && runtime.is_component(node) {
                    report.skipped_components += 1;
                    continue;
                }
                report.visited += 1;

                let mut owns_children = false;
                for (name, exp) in document.attributes(node) {
                    let Some(directive) = process_directive(node, &name, &exp, store, context)
                    else {
                        continue;
                    };
                    report.bound += 1;
                    document.remove_attribute(node, &name);
                    owns_children |= directive == "text" || directive == "html";
                }

                if owns_children || document.tag_name(node).as_deref() == Some("template") {
                    continue;
                }
                stack.extend(document.children(node).into_iter().rev());
            }
            Some(NodeType::Text) => {
                report.visited += 1;
                let Some(data) = document.text(node) else {
                    continue;
                };
                if let Some(exp) = interpolate(&data) {
                    if process_directive(node, "x-text", &exp, store, context).is_some() {
                        report.bound += 1;
                    }
                }
            }
            _ => {}
        }
    }

    debug!(
        element = root.raw(),
        visited = report.visited,
        bound = report.bound,
        skipped = report.skipped_components,
        "walk complete"
    );
    report
}

/// Rewrite text carrying `{{ expr }}` markers into one concatenation
/// expression, or `None` when there is nothing to interpolate.
///
/// Literal runs become JSON string literals and each marker becomes
/// `$s(expr)`, so `Hello {{name}}!` yields `"Hello "+$s(name)+"!"`.
/// An unclosed marker is kept as literal text.
pub fn interpolate(data: &str) -> Option<String> {
    if !data.contains(OPEN) {
        return None;
    }

    let mut segments: Vec<String> = Vec::new();
    let mut rest = data;
    let mut found = false;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        // Lazy match: the marker needs at least one character of body.
        let Some(end) = after
            .char_indices()
            .nth(1)
            .and_then(|(skip, _)| after[skip..].find(CLOSE).map(|i| i + skip))
        else {
            break;
        };
        if start > 0 {
            segments.push(quote(&rest[..start]));
        }
        segments.push(format!("$s({})", &after[..end]));
        rest = &after[end + CLOSE.len()..];
        found = true;
    }
    if !found {
        return None;
    }
    if !rest.is_empty() {
        segments.push(quote(rest));
    }
    Some(segments.join("+"))
}

fn quote(literal: &str) -> String {
    serde_json::Value::String(literal.to_string()).to_string()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
