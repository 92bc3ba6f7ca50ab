use grader_core::GraderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node '{node}' failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: GraderError,
    },
    #[error("missing node: {node}")]
    MissingNode { node: String },
    #[error("invalid edge '{from}' -> '{to}'")]
    InvalidEdge { from: String, to: String },
    #[error("duplicate node: {node}")]
    DuplicateNode { node: String },
    #[error("reserved node name: {node}")]
    ReservedName { node: String },
    #[error("graph has no entry edge from START")]
    MissingEntry,
    #[error("node '{node}' is unreachable from START")]
    Unreachable { node: String },
    #[error("Cycle detected: node '{node}' depends on itself")]
    CycleDetected { node: String },
}

impl GraphError {
    /// The task error behind a `NodeFailed`, if any.
    pub fn node_error(&self) -> Option<&GraderError> {
        match self {
            GraphError::NodeFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
