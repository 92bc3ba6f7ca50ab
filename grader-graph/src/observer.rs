use std::time::Duration;

use grader_core::GraderError;

/// Hooks called by the runner around every node execution. Calls for nodes in
/// the same superstep may interleave.
pub trait Observer: Send + Sync {
    fn on_node_start(&self, _node: &str, _step: usize) {}
    fn on_node_end(&self, _node: &str, _step: usize, _elapsed: Duration) {}
    fn on_error(&self, _node: &str, _error: &GraderError) {}
}
