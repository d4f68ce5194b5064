//! Markup parser.
//!
//! A forgiving parser for the markup fragments components and `x-html`
//! bindings use: elements with quoted, unquoted and boolean attributes,
//! void and self-closing elements, text, comments and raw-text `script` /
//! `style` bodies. Unclosed elements are closed at the end of input and stray
//! closing tags are ignored.

use super::document::Tree;
use super::node::{is_void, NodeData, NodeId, NodeKind};
use crate::error::DomError;

const RAW_TEXT: &[&str] = &["script", "style"];

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

/// Parse `src` into detached nodes owned by `tree`, returning the top-level
/// nodes in order.
pub(crate) fn parse_fragment(tree: &mut Tree, src: &str) -> Result<Vec<NodeId>, DomError> {
    let mut parser = Parser { src, pos: 0 };
    let mut roots = Vec::new();
    // open elements, innermost last
    let mut stack: Vec<(NodeId, String)> = Vec::new();

    let mut attach = |tree: &mut Tree, stack: &[(NodeId, String)], node: NodeId| {
        match stack.last() {
            Some((parent, _)) => tree.attach(*parent, node),
            None => roots.push(node),
        }
    };

    while !parser.at_end() {
        if parser.starts_with("<!--") {
            let body = parser.comment()?;
            let node = tree.insert(NodeData::new(NodeKind::Comment(body)));
            attach(tree, &stack, node);
        } else if parser.starts_with("<!") {
            // doctype and friends carry nothing we keep
            parser.skip_past('>')?;
        } else if parser.starts_with("</") && parser.peek_at(2).is_some_and(|c| c.is_ascii_alphabetic()) {
            let tag = parser.closing_tag()?;
            if let Some(index) = stack.iter().rposition(|(_, open)| *open == tag) {
                stack.truncate(index);
            }
        } else if parser.starts_with("<") && parser.peek_at(1).is_some_and(|c| c.is_ascii_alphabetic()) {
            let (tag, attributes, self_closing) = parser.opening_tag()?;
            let mut data = NodeData::element(&tag);
            if let Some(el) = data.as_element_mut() {
                el.attributes.extend(attributes);
            }
            let node = tree.insert(data);
            attach(tree, &stack, node);

            if RAW_TEXT.contains(&tag.as_str()) {
                let body = parser.raw_text(&tag);
                if !body.is_empty() {
                    let text = tree.insert(NodeData::new(NodeKind::Text(body)));
                    tree.attach(node, text);
                }
            } else if !self_closing && !is_void(&tag) {
                stack.push((node, tag));
            }
        } else {
            let text = parser.text();
            let node = tree.insert(NodeData::new(NodeKind::Text(decode_entities(text))));
            attach(tree, &stack, node);
        }
    }

    Ok(roots)
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.rest().get(offset..).and_then(|s| s.chars().next())
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: &str) -> DomError {
        DomError::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_past(&mut self, end: char) -> Result<(), DomError> {
        match self.rest().find(end) {
            Some(index) => {
                self.pos += index + end.len_utf8();
                Ok(())
            }
            None => Err(self.error("unterminated declaration")),
        }
    }

    fn comment(&mut self) -> Result<String, DomError> {
        self.pos += 4;
        match self.rest().find("-->") {
            Some(index) => {
                let body = self.rest()[..index].to_string();
                self.pos += index + 3;
                Ok(body)
            }
            None => Err(self.error("unterminated comment")),
        }
    }

    fn text(&mut self) -> &'a str {
        let start = self.pos;
        // a lone '<' that does not open a tag is text
        self.bump();
        while let Some(c) = self.peek() {
            if c == '<' {
                let next = self.peek_at(1);
                if next.is_some_and(|n| n.is_ascii_alphabetic() || n == '/' || n == '!') {
                    break;
                }
            }
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '/' | '>' | '=' | '"' | '\'' | '<') {
                break;
            }
            self.bump();
        }
        self.src[start..self.pos].to_ascii_lowercase()
    }

    fn closing_tag(&mut self) -> Result<String, DomError> {
        self.pos += 2;
        let tag = self.name();
        self.skip_past('>')?;
        Ok(tag)
    }

    fn opening_tag(&mut self) -> Result<(String, Vec<(String, String)>, bool), DomError> {
        self.bump();
        let tag = self.name();
        let mut attributes: Vec<(String, String)> = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unterminated tag")),
                Some('>') => {
                    self.bump();
                    return Ok((tag, attributes, false));
                }
                Some('/') => {
                    self.bump();
                    self.skip_whitespace();
                    if self.peek() == Some('>') {
                        self.bump();
                        return Ok((tag, attributes, true));
                    }
                }
                Some(_) => {
                    let name = self.name();
                    if name.is_empty() {
                        return Err(self.error("invalid attribute"));
                    }
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.bump();
                        self.skip_whitespace();
                        self.attribute_value()?
                    } else {
                        String::new()
                    };
                    // first occurrence wins
                    if !attributes.iter().any(|(existing, _)| *existing == name) {
                        attributes.push((name, value));
                    }
                }
            }
        }
    }

    fn attribute_value(&mut self) -> Result<String, DomError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                match self.rest().find(quote) {
                    Some(index) => {
                        let raw = &self.rest()[..index];
                        self.pos += index + 1;
                        Ok(decode_entities(raw))
                    }
                    None => Err(self.error("unterminated attribute value")),
                }
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.bump();
                }
                Ok(decode_entities(&self.src[start..self.pos]))
            }
        }
    }

    fn raw_text(&mut self, tag: &str) -> String {
        let close = format!("</{tag}");
        let rest = self.rest();
        let end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
        let body = rest[..end].to_string();
        self.pos += end;
        if !self.at_end() {
            // consume the closing tag; a missing '>' just ends the input
            if self.skip_past('>').is_err() {
                self.pos = self.src.len();
            }
        }
        body
    }
}

pub(crate) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(index) = rest.find('&') {
        out.push_str(&rest[..index]);
        rest = &rest[index..];
        let entity = rest.find(';').filter(|end| *end <= 10).map(|end| &rest[1..end]);
        let decoded = entity.and_then(|name| match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ if name.starts_with("#x") => u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32),
            _ if name.starts_with('#') => name[1..].parse().ok().and_then(char::from_u32),
            _ => None,
        });
        match (entity, decoded) {
            (Some(name), Some(c)) => {
                out.push(c);
                rest = &rest[name.len() + 2..];
            }
            _ => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub(crate) fn escape_attribute(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
