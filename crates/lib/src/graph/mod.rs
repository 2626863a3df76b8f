//! The configuration graph.
//!
//! Projects own named configurations that extend each other (cycles allowed).
//! Keys are declared once and bound per project or configuration by
//! [`Binding`]s. Resolving a key in a configuration stack folds the key's
//! operations in traversal order:
//!
//! 1. the project's base bindings
//! 2. the bindings of every configuration reached by a depth-first, pre-order
//!    walk from the innermost stack entry outwards, each visited once
//!
//! Only operations from the last `Set` onwards are evaluated.
//!
//! ```text
//! GraphBuilder --plugins--> GraphBuilder::build --> ConfigGraph
//!                                                      |
//!                                   EvalSession (memo) + Scope (bindings)
//! ```

mod builder;
mod config_graph;
pub mod definition;
mod memo;
mod session;
mod types;

pub use builder::{GraphBuilder, GraphPlugin};
pub use config_graph::{ConfigGraph, ConfigId, KeyId, Operation, ProjectId};
pub use definition::BuildDefinition;
pub use session::{EvalSession, Scope};
pub use types::{Binding, BindingKind, EvalError, KeyDef, KeyKind, ModifyFn, SetFn, Value, ValueType};
