//! Minimal selector engine.
//!
//! Supports selector lists (`a, b`), the descendant combinator and compound
//! selectors built from `tag`, `*`, `#id`, `.class`, `[attr]` and
//! `[attr=value]`. Anything else is a parse error, which callers use to tell
//! selectors apart from markup.

use super::document::Tree;
use super::node::{NodeData, NodeId};
use crate::error::DomError;

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Tag(String),
    Id(String),
    Class(String),
    Attribute(String, Option<String>),
}

/// One compound selector: all conditions must hold.
#[derive(Debug, Clone, PartialEq, Default)]
struct Compound(Vec<Condition>);

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    /// Each alternative is a chain of compounds joined by descendant
    /// combinators, outermost first.
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    pub fn parse(src: &str) -> Result<Self, DomError> {
        let error = |message: &str| DomError::Parse {
            position: 0,
            message: format!("{message} in selector `{src}`"),
        };

        let mut alternatives = Vec::new();
        for alternative in src.split(',') {
            let chain: Vec<Compound> = alternative
                .split_whitespace()
                .map(parse_compound)
                .collect::<Option<_>>()
                .ok_or_else(|| error("unsupported syntax"))?;
            if chain.is_empty() {
                return Err(error("empty selector"));
            }
            alternatives.push(chain);
        }
        Ok(Self { alternatives })
    }

    pub(crate) fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|chain| matches_chain(tree, node, chain))
    }
}

fn parse_compound(src: &str) -> Option<Compound> {
    let mut conditions = Vec::new();
    let mut rest = src;

    let tag_len = rest
        .find(|c: char| matches!(c, '#' | '.' | '['))
        .unwrap_or(rest.len());
    let tag = &rest[..tag_len];
    if !tag.is_empty() && tag != "*" {
        if !is_ident(tag) {
            return None;
        }
        conditions.push(Condition::Tag(tag.to_ascii_lowercase()));
    }
    rest = &rest[tag_len..];

    while let Some(first) = rest.chars().next() {
        match first {
            '#' | '.' => {
                let body = &rest[1..];
                let len = body
                    .find(|c: char| matches!(c, '#' | '.' | '['))
                    .unwrap_or(body.len());
                let name = &body[..len];
                if !is_ident(name) {
                    return None;
                }
                conditions.push(if first == '#' {
                    Condition::Id(name.to_string())
                } else {
                    Condition::Class(name.to_string())
                });
                rest = &body[len..];
            }
            '[' => {
                let end = rest.find(']')?;
                let body = &rest[1..end];
                let condition = match body.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim_matches(|c| c == '"' || c == '\'');
                        Condition::Attribute(name.trim().to_ascii_lowercase(), Some(value.to_string()))
                    }
                    None => Condition::Attribute(body.trim().to_ascii_lowercase(), None),
                };
                if let Condition::Attribute(name, _) = &condition {
                    if name.is_empty() {
                        return None;
                    }
                }
                conditions.push(condition);
                rest = &rest[end + 1..];
            }
            _ => return None,
        }
    }

    Some(Compound(conditions))
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

fn matches_compound(data: &NodeData, compound: &Compound) -> bool {
    let Some(el) = data.as_element() else {
        return false;
    };
    compound.0.iter().all(|condition| match condition {
        Condition::Tag(tag) => el.tag == *tag,
        Condition::Id(id) => el.attributes.get("id").is_some_and(|v| v == id),
        Condition::Class(class) => el
            .attributes
            .get("class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == class)),
        Condition::Attribute(name, None) => el.attributes.contains_key(name),
        Condition::Attribute(name, Some(value)) => {
            el.attributes.get(name).is_some_and(|v| v == value)
        }
    })
}

fn matches_chain(tree: &Tree, node: NodeId, chain: &[Compound]) -> bool {
    let Some((last, ancestors)) = chain.split_last() else {
        return false;
    };
    let Some(data) = tree.get(node) else {
        return false;
    };
    if !matches_compound(data, last) {
        return false;
    }

    // greedy ancestor walk for the remaining compounds
    let mut remaining = ancestors;
    let mut current = data.parent;
    while let Some((needed, rest)) = remaining.split_last() {
        let Some(id) = current else {
            return false;
        };
        let Some(ancestor) = tree.get(id) else {
            return false;
        };
        if matches_compound(ancestor, needed) {
            remaining = rest;
        }
        current = ancestor.parent;
    }
    true
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
