//! Statement-tree to stage-graph pipeline.
//!
//! Statements flow through four layers:
//!
//! ```text
//! ExprNode tree ──► ObjectRegistry ──► GraphCompiler ──► CompiledTree
//!  (statements)     (named objects,     (per rule)        (StageGraph +
//!                    anonymous rules)                      lifecycle)
//! ```
//!
//! # Design
//!
//! - **Arena graph**: `StageGraph` is the only owner of stage instances;
//!   links are `StageId` indices into it.
//! - **Inline once, clone after**: a declared stage sits at its first use
//!   point; further uses get fresh clones.
//! - **Shared endpoints**: a named source or destination is compiled once
//!   and reached through per-use multiplexers.
//! - **Lifecycle ordering**: stages are released before the statement tree
//!   that declared them.

pub mod compiler;
pub mod error;
pub mod expr;
pub mod graph;
pub mod id;
pub mod message;
pub mod registry;
pub mod snapshot;
pub mod stage;
pub mod stages;
pub mod template;
pub mod tree;

pub use compiler::{Fragment, GraphCompiler};
pub use error::{
    CompileError, CompileResult, DuplicateNamedObject, NodeDescriptor, StageError, StageFailure,
    StartError, StopError,
};
pub use expr::{Content, ExprFlags, ExprNode, Layout, NodeObject, SourceLocation};
pub use graph::{SlotRole, StageGraph, StageOrigin, StageSlot};
pub use id::StageId;
pub use message::{LogMessage, Verdict};
pub use registry::{ObjectKey, ObjectRegistry, ObjectTable};
pub use snapshot::{EdgeKind, EdgeSnapshot, GraphSnapshot, StageSnapshot};
pub use stage::{Capabilities, Stage, StageHandle};
pub use stages::{BuiltinStages, DriverKind, DriverSpec, StageFactory};
pub use template::{Template, TemplateRegistry};
pub use tree::{CompiledTree, TreeState};
