use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::Observer;

/// Runner-level limits. Both default to "none": every ready node of a
/// superstep runs at once and no node is ever timed out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub max_concurrency: Option<usize>,
    pub node_timeout: Option<Duration>,
}

impl ExecutionConfig {
    pub fn merge(&self, overrides: &ExecutionOptions) -> Self {
        Self {
            max_concurrency: overrides.max_concurrency.or(self.max_concurrency),
            node_timeout: overrides.node_timeout.or(self.node_timeout),
        }
    }
}

#[derive(Clone, Default)]
pub struct ExecutionOptions {
    pub max_concurrency: Option<usize>,
    pub node_timeout: Option<Duration>,
    pub observer: Option<Arc<dyn Observer>>,
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("max_concurrency", &self.max_concurrency)
            .field("node_timeout", &self.node_timeout)
            .field("observer", &self.observer.as_ref().map(|_| "<observer>"))
            .finish()
    }
}
