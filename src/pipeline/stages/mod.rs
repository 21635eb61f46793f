//! Built-in stage implementations.

pub mod collect;
pub mod factory;
pub mod filter;
pub mod internal;
pub mod kv;
pub mod rewrite;
pub mod structural;

pub use collect::{CollectBuffer, CollectDestination};
pub use factory::{BuiltinStages, DriverKind, DriverSpec, StageFactory};
pub use filter::MatchFilter;
pub use internal::InternalSource;
pub use kv::KvParser;
pub use rewrite::SetRewrite;
pub use structural::{Multiplexer, PassThrough};
