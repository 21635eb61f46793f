//! # logroute-rs: routing configuration compiler
//!
//! Turns the statement tree of a log daemon configuration (sources,
//! filters, parsers, rewrites, destinations and the `log` rules connecting
//! them) into a graph of processing stages, and manages that graph's
//! lifecycle.
//!
//! ## Architecture
//!
//! - **Statement tree**: `ExprNode` trees, built by the route file loader or
//!   directly through the construction API
//! - **Registry**: named objects for reference resolution, plus the ordered
//!   list of anonymous rules
//! - **Compiler**: lowers each rule into linked, forked and joined stages
//! - **Compiled tree**: owns the stage graph; `compile` → `start` → `stop` →
//!   `free`
//!
//! ## Configuration
//!
//! Route files are looked up in the platform configuration directory under
//! `logroute/routes.toml` unless a path is given.
//!
//! ## Example
//!
//! ```ignore
//! use logroute_rs::{config, BuiltinStages};
//!
//! let factory = BuiltinStages::new();
//! let mut tree = config::load_tree("routes.toml", &factory)?;
//! tree.start()?;
//! println!("{}", tree.snapshot());
//! tree.stop()?;
//! tree.free();
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::{GlobalOptions, RouteFile};
pub use error::{Result, RouteError};
pub use pipeline::{
    BuiltinStages, Capabilities, CompileError, CompiledTree, Content, ExprFlags, ExprNode,
    GraphCompiler, GraphSnapshot, Layout, ObjectRegistry, SourceLocation, Stage, StageHandle,
    StageId, TreeState,
};
