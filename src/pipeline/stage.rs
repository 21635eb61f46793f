//! Stage abstraction for the routing graph.
//!
//! Two layers:
//! - **`Stage` trait**: the capability contract every processing unit
//!   implements (sources, filters, parsers, rewriters, destinations and the
//!   compiler's own multiplexer/pass-through stages).
//! - **`StageHandle`**: a reference-counted handle shared between the
//!   declaring `ExprNode` and the `StageGraph` slot that owns the instance
//!   in the compiled graph.

use crate::config::GlobalOptions;
use crate::pipeline::error::StageError;
use crate::pipeline::message::{LogMessage, Verdict};
use bitflags::bitflags;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

bitflags! {
    /// Capability and routing bits of a stage.
    ///
    /// A stage declares the first three itself; the compiler adds the
    /// propagated ones to the head stage of a branch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// Produces messages; never chained from an upstream stage.
        const IS_SOURCE = 1 << 0;
        /// Modifies messages, so forks in front of it must clone.
        const CHANGES_MESSAGE = 1 << 1;
        /// Requires acknowledged delivery.
        const HARD_FLOW_CONTROL = 1 << 2;
        /// Head of a `fallback` branch.
        const BRANCH_FALLBACK = 1 << 3;
        /// Head of a `final` branch.
        const BRANCH_FINAL = 1 << 4;
    }
}

impl Capabilities {
    /// Flag names, for dumps.
    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// Trait implemented by every processing stage.
#[cfg_attr(test, mockall::automock)]
pub trait Stage: Send {
    /// Short human-readable label (driver name plus key options).
    fn label(&self) -> String;

    /// Capability bits consulted by the compiler.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Called once when the compiled tree starts.
    fn init(&mut self, _options: &GlobalOptions) -> Result<(), StageError> {
        Ok(())
    }

    /// Called once when the compiled tree stops.
    fn deinit(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    /// Fresh instance for a second use point, or `None` if this kind refuses.
    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        None
    }

    /// Dispatch entry used by the runtime once the graph is live.
    fn queue(&mut self, _message: &mut LogMessage) -> Verdict {
        Verdict::Forward
    }
}

struct StageCell {
    stage: Mutex<Box<dyn Stage>>,
    inlined: AtomicBool,
}

/// Shared handle to one stage instance.
///
/// A declared instance may be used directly (inlined) at exactly one point
/// of the graph; every further use point gets a clone.
#[derive(Clone)]
pub struct StageHandle {
    inner: Arc<StageCell>,
}

impl StageHandle {
    pub fn new<S: Stage + 'static>(stage: S) -> Self {
        Self::from_boxed(Box::new(stage))
    }

    pub fn from_boxed(stage: Box<dyn Stage>) -> Self {
        Self {
            inner: Arc::new(StageCell {
                stage: Mutex::new(stage),
                inlined: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Stage>> {
        self.inner
            .stage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn label(&self) -> String {
        self.lock().label()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.lock().capabilities()
    }

    /// Whether this instance already sits at a point of the graph.
    pub fn is_inlined(&self) -> bool {
        self.inner.inlined.load(Ordering::Acquire)
    }

    /// Mark the instance as inlined. Returns the previous state.
    pub(crate) fn mark_inlined(&self) -> bool {
        self.inner.inlined.swap(true, Ordering::AcqRel)
    }

    /// Clone the underlying stage into a new, not yet inlined handle.
    pub fn try_clone(&self) -> Option<StageHandle> {
        self.lock().clone_stage().map(StageHandle::from_boxed)
    }

    pub fn init(&self, options: &GlobalOptions) -> Result<(), StageError> {
        self.lock().init(options)
    }

    pub fn deinit(&self) -> Result<(), StageError> {
        self.lock().deinit()
    }

    pub fn queue(&self, message: &mut LogMessage) -> Verdict {
        self.lock().queue(message)
    }

    /// Number of live handles to this instance.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether two handles point at the same instance.
    pub fn ptr_eq(a: &StageHandle, b: &StageHandle) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for StageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandle")
            .field("label", &self.label())
            .field("inlined", &self.is_inlined())
            .field("refs", &self.ref_count())
            .finish()
    }
}
