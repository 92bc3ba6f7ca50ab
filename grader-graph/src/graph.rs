use std::time::Instant;

use futures::stream::{self, StreamExt};
use grader_core::{GraderError, GraphState, StateSchema, StateUpdate};
use petgraph::graph::NodeIndex;
use tracing::Instrument;

use crate::program::GraphProgram;
use crate::{
    ExecutionConfig, ExecutionOptions, GraphContext, GraphError, GraphNode, Observer, END, START,
};

pub struct GraphBuilder<S: StateSchema> {
    nodes: Vec<(String, Box<dyn GraphNode<S>>)>,
    edges: Vec<(String, String)>,
    default_config: ExecutionConfig,
}

impl<S: StateSchema> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateSchema> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            default_config: ExecutionConfig::default(),
        }
    }

    pub fn with_default_config(mut self, config: ExecutionConfig) -> Self {
        self.default_config = config;
        self
    }

    pub fn add_node<N>(mut self, name: &str, node: N) -> Self
    where
        N: GraphNode<S> + 'static,
    {
        self.nodes.push((name.to_string(), Box::new(node)));
        self
    }

    /// Adds a dependency edge. A node may have several outgoing edges
    /// (fan-out) and several incoming ones (fan-in); it runs once all of its
    /// predecessors have completed.
    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        self.edges.push((from.to_string(), to.to_string()));
        self
    }

    pub fn set_entry(self, name: &str) -> Self {
        self.add_edge(START, name)
    }

    pub fn set_finish(self, name: &str) -> Self {
        self.add_edge(name, END)
    }

    pub fn build(self) -> Result<ExecutableGraph<S>, GraphError> {
        let program = GraphProgram::compile(self.nodes, self.edges)?;
        Ok(ExecutableGraph {
            program,
            config: self.default_config,
        })
    }
}

pub struct ExecutableGraph<S: StateSchema> {
    program: GraphProgram<S>,
    config: ExecutionConfig,
}

impl<S: StateSchema> ExecutableGraph<S> {
    /// Node names in declaration order.
    pub fn node_names(&self) -> Vec<String> {
        self.program.node_names()
    }

    /// Every edge including the virtual `START`/`END` ones.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.program.edge_names()
    }

    /// The waves the runner will execute, in order.
    pub fn supersteps(&self) -> Vec<Vec<String>> {
        self.program.supersteps()
    }

    pub async fn invoke(&self, state: GraphState<S>) -> Result<GraphState<S>, GraphError> {
        self.invoke_with_options(state, ExecutionOptions::default())
            .await
    }

    /// Runs the graph to completion.
    ///
    /// Each superstep runs all ready nodes concurrently against the same
    /// snapshot, waits for every one of them, then merges their updates in
    /// declaration order. The first failing node aborts the run and the
    /// remaining in-flight nodes of its superstep are dropped.
    pub async fn invoke_with_options(
        &self,
        mut state: GraphState<S>,
        options: ExecutionOptions,
    ) -> Result<GraphState<S>, GraphError> {
        let config = self.config.merge(&options);
        let observer = options.observer.as_deref();

        let mut remaining = self.program.in_degrees();
        let mut ready = self.program.initial_ready(&remaining);
        let mut step = 0usize;

        while !ready.is_empty() {
            ready.sort_unstable();
            tracing::debug!(
                step,
                nodes = ?ready
                    .iter()
                    .map(|&index| self.program.node(index).name.as_str())
                    .collect::<Vec<_>>(),
                "superstep"
            );

            let limit = config.max_concurrency.unwrap_or(ready.len()).max(1);
            let snapshot = &state;
            let mut in_flight = stream::iter(ready.iter().map(|&index| {
                self.run_node(index, snapshot.clone(), step, &config, observer)
            }))
            .buffer_unordered(limit);

            let mut updates: Vec<(NodeIndex, StateUpdate<S>)> = Vec::with_capacity(ready.len());
            while let Some((index, outcome)) = in_flight.next().await {
                match outcome {
                    Ok(update) => updates.push((index, update)),
                    Err(source) => {
                        return Err(GraphError::NodeFailed {
                            node: self.program.node(index).name.clone(),
                            source,
                        });
                    }
                }
            }
            drop(in_flight);

            updates.sort_unstable_by_key(|(index, _)| *index);
            let mut next = Vec::new();
            for (index, update) in updates {
                state = state.apply_update(update);
                self.program.release(index, &mut remaining, &mut next);
            }

            ready = next;
            step += 1;
        }

        tracing::debug!(steps = step, state = %state.data.trace_repr(), "graph finished");
        Ok(state)
    }

    async fn run_node(
        &self,
        index: NodeIndex,
        input: GraphState<S>,
        step: usize,
        config: &ExecutionConfig,
        observer: Option<&dyn Observer>,
    ) -> (NodeIndex, Result<StateUpdate<S>, GraderError>) {
        let data = self.program.node(index);
        let context = GraphContext {
            node: data.name.clone(),
            step,
        };
        let span = tracing::info_span!("graph_node", node = %data.name, step);

        async move {
            if let Some(observer) = observer {
                observer.on_node_start(&data.name, step);
            }
            let started = Instant::now();

            let call = data.runnable.invoke_with_context(input, &context);
            let outcome = match config.node_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(GraderError::Timeout(limit))),
                None => call.await,
            };

            let elapsed = started.elapsed();
            match &outcome {
                Ok(_) => {
                    tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "node finished");
                    if let Some(observer) = observer {
                        observer.on_node_end(&data.name, step, elapsed);
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "node failed");
                    if let Some(observer) = observer {
                        observer.on_error(&data.name, error);
                    }
                }
            }
            (index, outcome)
        }
        .instrument(span)
        .await
    }
}
