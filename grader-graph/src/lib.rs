mod config;
mod error;
mod graph;
mod node;
mod observer;
mod program;

pub use config::{ExecutionConfig, ExecutionOptions};
pub use error::GraphError;
pub use graph::{ExecutableGraph, GraphBuilder};
pub use grader_core::state;
pub use grader_core::{GraphState, StateSchema, StateUpdate};
pub use node::{GraphContext, GraphNode};
pub use observer::Observer;

/// Virtual source node: `add_edge(START, name)` marks `name` as an entry.
pub const START: &str = "__start__";
/// Virtual sink node: `add_edge(name, END)` marks `name` as terminal.
pub const END: &str = "__end__";
