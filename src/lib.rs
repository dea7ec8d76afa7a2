//! # fluentxml
//!
//! Chainable node-set traversal and mutation over XML and HTML trees.
//! Selections are ordered, duplicate-free lists of nodes of one document;
//! every traversal spawns a new selection that remembers where it came
//! from, and every mutation clones content into its targets.
//!
//! ## Quick Start
//!
//! ```
//! use fluentxml::Nodes;
//!
//! let doc = Nodes::load("<list><item>one</item></list>", "text/xml").unwrap();
//! let list = doc.find("/list").unwrap();
//! list.append("<item>two</item>").unwrap();
//!
//! let items = list.children(None).unwrap();
//! assert_eq!(items.map(|node, _| node.text_content()), vec!["one", "two"]);
//! assert!(items.end().ptr_eq(&list));
//! ```
//!
//! ## Layout
//!
//! - [`tree`]: the arena document and node handles
//! - [`loader`]: XML and HTML markup loaders keyed by content type
//! - [`xpath`]: the `XPath` 1.0 evaluator used for every selection
//! - [`nodes`]: the node-set engine ([`Nodes`], fetching, ordering,
//!   content resolution, mutation primitives)
//! - `query`: the fluent traversal and manipulation methods of [`Nodes`]
//! - [`serial`]: markup serialization
//! - [`encoding`]: byte input decoding

pub mod encoding;
pub mod error;
pub mod loader;
pub mod nodes;
mod query;
pub mod serial;
pub mod tree;
pub mod xpath;

// Re-export primary types at the crate root for convenience.
pub use error::{Error, Result};
pub use nodes::{Config, Content, FetchOptions, Nodes};
pub use tree::{Attribute, Document, Node, NodeId, SharedDocument};
