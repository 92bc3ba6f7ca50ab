use async_trait::async_trait;
use grader_core::{GraderError, GraphState, StateSchema, StateUpdate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphContext {
    pub node: String,
    pub step: usize,
}

/// A unit of work in the graph: reads a snapshot of the state and returns a
/// partial update that the runner merges through the state's reducers.
#[async_trait]
pub trait GraphNode<S: StateSchema>: Send + Sync {
    async fn invoke_with_context(
        &self,
        input: GraphState<S>,
        context: &GraphContext,
    ) -> Result<StateUpdate<S>, GraderError>;
}
