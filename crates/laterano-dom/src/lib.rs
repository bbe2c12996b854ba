//! # Host tree
//!
//! `laterano-dom` is the small tree the Laterano core renders into. It plays
//! the role a browser DOM plays for a web component: the core only ever
//! talks to it through a handful of primitives.
//!
//! - [`Document`] owns every node in a slotmap arena; [`NodeId`] handles stay
//!   valid while a node is detached, which is what conditional and list
//!   rendering rely on to move the *same* element in and out of the tree.
//! - [`Document::parse_template`] / [`Document::parse_fragment`] turn markup
//!   into nodes. The parser is lenient and never fails.
//! - [`dispatch_event`] bubbles an event from a target to its ancestors.
//!
//! ```rust
//! use laterano_dom::Document;
//!
//! let mut doc = Document::new();
//! let root = doc.parse_template(r#"<p class="hello">Hi</p>"#);
//! let anchor = doc.create_comment(" anchor ");
//! doc.insert_before(root, anchor, doc.first_child(root));
//! assert_eq!(doc.outer_markup(root), r#"<p class="hello"><!-- anchor -->Hi</p>"#);
//! ```

pub mod event;
pub mod markup;
pub mod node;

pub use event::*;
pub use markup::decode_entities;
pub use node::*;
