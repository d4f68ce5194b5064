//! Document model.
//!
//! A small in-memory stand-in for the browser DOM: an arena of element,
//! text, comment and fragment nodes with attributes, inline style, live
//! properties, event listeners with abort signals, a markup parser, a
//! selector engine and connect/disconnect observers.

mod document;
mod events;
mod node;
mod parser;
mod selector;

pub use document::{Document, DocumentObserver};
pub use events::{AbortController, AbortSignal, Event, Listener, ListenerId};
pub use node::{NodeId, NodeType};
pub use selector::Selector;
