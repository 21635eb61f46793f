//! Global options shared by every stage of a configuration
//!
//! These are the `[options]` table of a route file. Each stage receives them
//! by reference in `Stage::init`; nothing here changes after the tree has
//! been built.

use serde::{Deserialize, Serialize};

/// Default interval of `-- MARK --` messages in seconds
pub const DEFAULT_MARK_FREQ_SECS: u64 = 1200;

/// Default number of messages a destination batches before flushing
pub const DEFAULT_FLUSH_LINES: usize = 100;

/// Default delay before a failed destination is reopened, in seconds
pub const DEFAULT_TIME_REOPEN_SECS: u64 = 60;

/// Options from the `[options]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalOptions {
    /// Interval of `-- MARK --` messages; 0 disables them
    pub mark_freq_secs: u64,

    /// Messages a destination batches before flushing
    pub flush_lines: usize,

    /// Delay before reopening a failed destination
    pub time_reopen_secs: u64,

    /// Order in which catch-all rules attach sources
    pub catch_all_order: CatchAllOrder,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            mark_freq_secs: DEFAULT_MARK_FREQ_SECS,
            flush_lines: DEFAULT_FLUSH_LINES,
            time_reopen_secs: DEFAULT_TIME_REOPEN_SECS,
            catch_all_order: CatchAllOrder::default(),
        }
    }
}

/// Order of the source references a catch-all rule receives.
///
/// Only registration order is supported; the option exists so the choice is
/// visible in configuration dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchAllOrder {
    #[default]
    Registration,
}

impl std::fmt::Display for CatchAllOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatchAllOrder::Registration => write!(f, "registration"),
        }
    }
}
