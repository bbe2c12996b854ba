//! # Components, State, and Bindings
//!
//! Laterano turns an HTML-like template plus a JSON state object into a live
//! tree that updates itself when state changes. A component is declared
//! with [`ComponentOptions`] and instantiated with [`Component::new`]:
//!
//! ```rust
//! use laterano_core::*;
//!
//! let counter = Component::new(
//!     ComponentOptions::new(
//!         "x-counter",
//!         r#"<div>
//!              <p>Count: {{ count }}</p>
//!              <button @click="count++">+</button>
//!            </div>"#,
//!     )
//!     .states(json!({ "count": 0 })),
//! );
//!
//! let button = counter.find("button").unwrap();
//! counter.dispatch_event(button, "click");
//! assert_eq!(counter.get_state("count"), Some(json!(1)));
//! assert!(counter.markup().contains("Count: 1"));
//! ```
//!
//! ## Template syntax
//!
//! - `{{ expr }}` interpolates into text.
//! - `:name="expr"` binds an attribute.
//! - `@event="handler"` attaches a listener. Handlers can be arrow
//!   functions, calls, bare function names or plain statements.
//! - `%if="expr"` adds or removes an element.
//! - `%for="(item, i) in items"` repeats an element; `%key="item.id"` keeps
//!   elements stable across reorders.
//! - `%connect="path"` binds a form control (or a `data-laterano-connect`
//!   attribute) to a state path, both ways.
//!
//! Expressions run in a small sandboxed evaluator ([`expr`]); they can see
//! component state and the current list item, and nothing else.
//!
//! ## Updates
//!
//! A write through [`Component::set_state`] or a handler updates bound text,
//! attributes, lists, connected controls and conditionals immediately.
//! Elements with a render function ([`Component::attach_render`]) are queued
//! instead and re-rendered at most once per [`Component::tick`].
//!
//! Nothing here panics on bad templates or failing expressions: problems are
//! logged under the `laterano` target and kept as [`Diagnostic`]s.

pub(crate) mod compiler;
pub mod component;
pub mod context;
pub mod error;
pub mod expr;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod value;

pub use compiler::macros::CONNECT_ATTRIBUTE;
pub use component::*;
pub use context::{BindingScope, ItemContext};
pub use error::{Diagnostic, HandlerError};
pub use laterano_dom::{Document, Event, NodeId};
pub use store::{DependencyLedger, StateStore};
pub use value::{Value, json};

#[cfg(test)]
mod tests;
