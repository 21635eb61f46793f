//! Stages the compiler creates on its own.
//!
//! Both only forward. Their wiring (hops of a multiplexer, the successor of
//! a join or attach point) is kept in the `StageGraph`, not in the stage.

use crate::pipeline::stage::Stage;

/// Fan-out point. Every hop receives the messages queued here.
#[derive(Debug, Default, Clone, Copy)]
pub struct Multiplexer;

impl Multiplexer {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Multiplexer {
    fn label(&self) -> String {
        "multiplexer".to_string()
    }

    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        Some(Box::new(*self))
    }
}

/// Join or attach point: forwards to its successor unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl PassThrough {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for PassThrough {
    fn label(&self) -> String {
        "pass".to_string()
    }

    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        Some(Box::new(*self))
    }
}
