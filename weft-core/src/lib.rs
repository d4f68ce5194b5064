//! Weft Core
//!
//! This crate binds a reactive key/value store to a document tree. It
//! implements:
//!
//! - Reactive primitives (signals, effects, a batching scheduler)
//! - A reactive store shared by an application's components
//! - A small expression language evaluated against the store
//! - A DOM walker that turns attribute and `{{ }}` markup into bindings
//! - Custom element components with scoped lifetimes
//!
//! # Architecture
//!
//! - `reactive`: signals, effects and the flush scheduler
//! - `store`: the keyed, signal-backed application state
//! - `expr`: expression parser, interpreter and compile cache
//! - `dom`: in-memory document, events, markup parser and selectors
//! - `directives`: the built-in bindings and the directive registry
//! - `walker`: one-pass binding of a component subtree
//! - `component`: definitions, contexts and app bootstrap
//! - `runtime`: the bundle one application shares
//!
//! # Example
//!
//! ```rust
//! use weft_core::{App, Component, Runtime};
//!
//! let runtime = Runtime::new();
//! let app = App::builder()
//!     .field("count", 0)
//!     .component("Counter", |_| {
//!         Component::new().template(r#"<p :data-count="count">{{count}}</p>"#)
//!     })
//!     .build()
//!     .unwrap();
//! let store = app.mount(&runtime).unwrap();
//!
//! let document = runtime.document();
//! let counter = document.create_element("x-counter");
//! document.append_child(document.body(), counter).unwrap();
//! assert_eq!(document.inner_html(counter), r#"<p data-count="0">0</p>"#);
//!
//! store.set("count", 1).unwrap();
//! runtime.scheduler().flush();
//! assert_eq!(document.inner_html(counter), r#"<p data-count="1">1</p>"#);
//! ```

pub mod component;
pub mod config;
pub mod directives;
pub mod dom;
pub mod error;
pub mod expr;
pub mod reactive;
pub mod runtime;
pub mod store;
pub mod value;
pub mod walker;

pub use component::{App, AppBuilder, Component, ComponentArgs, ComponentContext, ComponentDefinition};
pub use config::AppConfig;
pub use directives::{process_directive, Directive, DirectiveArgs, DirectiveRegistry};
pub use dom::{Document, Event, NodeId};
pub use error::{DomError, EvalError, ReactiveError, SetupError, StoreError};
pub use expr::{Evaluator, Scope};
pub use reactive::{Cleanup, Effect, FlushReport, Scheduler, Signal};
pub use runtime::Runtime;
pub use store::Store;
pub use value::Value;
pub use walker::{create_walker, WalkReport};
