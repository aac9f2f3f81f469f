//! fleetstack core
//!
//! Declarative model of a single cloud deployment topology: a network, a
//! managed Kubernetes cluster with its capacity and addons, a static content
//! delivery path and a managed database, wired together by typed references.
//!
//! ```text
//! stack.kdl ──► template ──► parser ──► StackDefinition
//!                                            │ build()
//!                                            ▼
//!                                          Stack ──► synth() ──► ResourceGraph
//! ```
//!
//! Construction runs in a single pass, in dependency order, and either
//! produces a complete graph or fails with a `TopologyError` naming the
//! offending entity.

pub mod error;
pub mod graph;
pub mod loader;
pub mod model;
pub mod parser;
pub mod stack;
pub mod template;

pub use error::{Result, TopologyError};
pub use graph::{OutputNode, ResourceGraph, ResourceNode, ValueExpr};
pub use loader::{LoadOptions, load_definition, load_stack};
pub use model::*;
pub use parser::{parse_stack_file, parse_stack_string};
pub use stack::Stack;
pub use template::{
    TemplateProcessor, Variables, extract_variables, kdl_value_to_json, parse_assignment,
};
