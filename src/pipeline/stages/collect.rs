//! CollectDestination: in-memory destination.
//!
//! Stores delivered messages in a shared buffer. Clones write into the same
//! buffer, so every use point of one destination definition fills it.

use crate::config::GlobalOptions;
use crate::pipeline::error::StageError;
use crate::pipeline::message::{LogMessage, Verdict};
use crate::pipeline::stage::Stage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared message buffer of one or more `collect` destinations.
#[derive(Debug, Clone, Default)]
pub struct CollectBuffer {
    messages: Arc<Mutex<Vec<LogMessage>>>,
}

impl CollectBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, message: LogMessage) {
        self.lock().push(message);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every stored message, leaving the buffer empty.
    pub fn take(&self) -> Vec<LogMessage> {
        std::mem::take(&mut *self.lock())
    }

    pub fn ptr_eq(&self, other: &CollectBuffer) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }
}

#[derive(Debug, Clone)]
pub struct CollectDestination {
    buffer: CollectBuffer,
    /// Maximum number of stored messages; 0 means unbounded.
    capacity: usize,
    flush_lines: usize,
    open: bool,
    dropped: u64,
}

impl CollectDestination {
    pub fn new(buffer: CollectBuffer) -> Self {
        Self {
            buffer,
            capacity: 0,
            flush_lines: 0,
            open: false,
            dropped: 0,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn buffer(&self) -> &CollectBuffer {
        &self.buffer
    }

    /// Batch size taken from the global options at `init`.
    pub fn flush_lines(&self) -> usize {
        self.flush_lines
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Messages refused because the buffer was full or the stage closed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Stage for CollectDestination {
    fn label(&self) -> String {
        match self.capacity {
            0 => "collect".to_string(),
            n => format!("collect(capacity={n})"),
        }
    }

    fn init(&mut self, options: &GlobalOptions) -> Result<(), StageError> {
        self.flush_lines = options.flush_lines;
        self.open = true;
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), StageError> {
        if !self.open {
            return Err(StageError::new("collect destination was not open"));
        }
        self.open = false;
        if self.dropped > 0 {
            tracing::warn!(dropped = self.dropped, "Collect destination dropped messages");
        }
        Ok(())
    }

    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        Some(Box::new(CollectDestination::new(self.buffer.clone()).with_capacity(self.capacity)))
    }

    fn queue(&mut self, message: &mut LogMessage) -> Verdict {
        if !self.open || (self.capacity > 0 && self.buffer.len() >= self.capacity) {
            self.dropped += 1;
            return Verdict::Drop;
        }
        self.buffer.push(message.clone());
        Verdict::Forward
    }
}
