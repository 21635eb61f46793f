//! Counting stages for lifecycle and ownership assertions

use logroute_rs::config::GlobalOptions;
use logroute_rs::pipeline::{Capabilities, Stage, StageError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters shared by a probe and all of its clones
#[derive(Debug, Default)]
pub struct ProbeStats {
    created: AtomicUsize,
    inits: AtomicUsize,
    deinits: AtomicUsize,
    clones: AtomicUsize,
    drops: AtomicUsize,
    last_flush_lines: AtomicUsize,
}

impl ProbeStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn deinits(&self) -> usize {
        self.deinits.load(Ordering::SeqCst)
    }

    pub fn clones(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    /// `flush_lines` seen by the most recent `init`
    pub fn last_flush_lines(&self) -> usize {
        self.last_flush_lines.load(Ordering::SeqCst)
    }
}

/// Stage that only counts what happens to it
pub struct Probe {
    label: String,
    capabilities: Capabilities,
    cloneable: bool,
    fail_init: bool,
    fail_deinit: bool,
    stats: Arc<ProbeStats>,
}

impl Probe {
    pub fn new(label: &str, stats: &Arc<ProbeStats>) -> Self {
        stats.created.fetch_add(1, Ordering::SeqCst);
        Self {
            label: label.to_string(),
            capabilities: Capabilities::empty(),
            cloneable: true,
            fail_init: false,
            fail_deinit: false,
            stats: Arc::clone(stats),
        }
    }

    /// A source: `IS_SOURCE`, refuses cloning
    pub fn source(label: &str, stats: &Arc<ProbeStats>) -> Self {
        Self::new(label, stats)
            .with_capabilities(Capabilities::IS_SOURCE)
            .not_cloneable()
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities |= capabilities;
        self
    }

    pub fn not_cloneable(mut self) -> Self {
        self.cloneable = false;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_deinit(mut self) -> Self {
        self.fail_deinit = true;
        self
    }
}

impl Stage for Probe {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn init(&mut self, options: &GlobalOptions) -> Result<(), StageError> {
        if self.fail_init {
            return Err(StageError::new(format!("{} refused to start", self.label)));
        }
        self.stats.inits.fetch_add(1, Ordering::SeqCst);
        self.stats
            .last_flush_lines
            .store(options.flush_lines, Ordering::SeqCst);
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), StageError> {
        self.stats.deinits.fetch_add(1, Ordering::SeqCst);
        if self.fail_deinit {
            return Err(StageError::new(format!("{} failed to flush", self.label)));
        }
        Ok(())
    }

    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        if !self.cloneable {
            return None;
        }
        self.stats.clones.fetch_add(1, Ordering::SeqCst);
        let mut clone = Probe::new(&self.label, &self.stats).with_capabilities(self.capabilities);
        clone.fail_init = self.fail_init;
        clone.fail_deinit = self.fail_deinit;
        Some(Box::new(clone))
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.stats.drops.fetch_add(1, Ordering::SeqCst);
    }
}
