//! `internal` source: messages the daemon emits about itself.

use crate::config::GlobalOptions;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::{Capabilities, Stage};

/// The daemon's own log stream. There is only one, so it refuses to clone.
#[derive(Debug, Default)]
pub struct InternalSource {
    mark_freq_secs: u64,
    running: bool,
}

impl InternalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Interval of `-- MARK --` messages, taken from the global options.
    pub fn mark_freq_secs(&self) -> u64 {
        self.mark_freq_secs
    }
}

impl Stage for InternalSource {
    fn label(&self) -> String {
        "internal".to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IS_SOURCE
    }

    fn init(&mut self, options: &GlobalOptions) -> Result<(), StageError> {
        if self.running {
            return Err(StageError::new("internal source is already running"));
        }
        self.mark_freq_secs = options.mark_freq_secs;
        self.running = true;
        tracing::debug!(mark_freq_secs = self.mark_freq_secs, "Internal source started");
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), StageError> {
        self.running = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_lifecycle() {
        let options = GlobalOptions {
            mark_freq_secs: 600,
            ..GlobalOptions::default()
        };
        let mut source = InternalSource::new();
        source.init(&options).unwrap();
        assert!(source.is_running());
        assert_eq!(source.mark_freq_secs(), 600);
        assert!(source.init(&options).is_err());

        source.deinit().unwrap();
        assert!(!source.is_running());
    }

    #[test]
    fn test_internal_refuses_clone() {
        let source = InternalSource::new();
        assert!(source.clone_stage().is_none());
        assert!(source.capabilities().contains(Capabilities::IS_SOURCE));
    }
}
