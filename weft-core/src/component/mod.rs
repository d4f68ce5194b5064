//! Components
//!
//! A component is a custom element bound to the app's store. Its
//! [`ComponentDefinition`] names the tag and the factory; each constructed
//! element gets a [`ComponentContext`] that owns everything bound inside it.

mod app;
mod context;
mod definition;

pub use app::{App, AppBuilder};
pub use context::{ComponentContext, Hook};
pub use definition::{tag_name, Component, ComponentArgs, ComponentDefinition, ComponentFactory};

pub(crate) use app::upgrade;
