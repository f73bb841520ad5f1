//! The owning sketch, as seen by the bridge
//!
//! The bridge only needs three things from the sketch: an output routine,
//! a way to request termination, and the sketch's own shutdown sequence.

use crate::types::ScriptResult;

/// The animation/sketch object that owns a bridge
pub trait Sketch: Send + Sync {
    /// Print text through the sketch's output routine
    fn println(&self, text: &str, stderr: bool);

    /// Ask the sketch to stop running (called after a fault)
    fn terminate_sketch(&self);

    /// The sketch's own end-of-life sequence, run by `Bridge::shutdown`
    fn shutdown(&self) -> ScriptResult<()> {
        Ok(())
    }
}
