use std::time::Duration;

use grader_core::GraderError;
use grader_graph::{
    state::{Append, Assign, Reducer},
    GraphBuilder, GraphContext, GraphNode, GraphState, StateSchema, StateUpdate, END, START,
};
use tokio::time::sleep;

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize, PartialEq)]
struct MergeState {
    messages: Vec<String>,
    last_node: Option<String>,
}

impl StateSchema for MergeState {
    type Update = Self;

    fn apply(current: &Self, update: Self) -> Self {
        MergeState {
            messages: Append.reduce(current.messages.clone(), update.messages),
            last_node: Assign.reduce(current.last_node.clone(), update.last_node),
        }
    }
}

struct AppendingNode {
    id: &'static str,
    delay_ms: u64,
}

#[async_trait::async_trait]
impl GraphNode<MergeState> for AppendingNode {
    async fn invoke_with_context(
        &self,
        _input: GraphState<MergeState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<MergeState>, GraderError> {
        sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(StateUpdate::new(MergeState {
            messages: vec![format!("msg from {}", self.id)],
            last_node: Some(self.id.to_string()),
        }))
    }
}

fn fan_out_graph(b_delay: u64, c_delay: u64, d_delay: u64) -> grader_graph::ExecutableGraph<MergeState> {
    GraphBuilder::<MergeState>::new()
        .add_node("A", AppendingNode { id: "A", delay_ms: 5 })
        .add_node("B", AppendingNode { id: "B", delay_ms: b_delay })
        .add_node("C", AppendingNode { id: "C", delay_ms: c_delay })
        .add_node("D", AppendingNode { id: "D", delay_ms: d_delay })
        .add_edge(START, "A")
        .add_edge("A", "B")
        .add_edge("A", "C")
        .add_edge("A", "D")
        .add_edge("B", END)
        .add_edge("C", END)
        .add_edge("D", END)
        .build()
        .expect("valid graph")
}

#[tokio::test]
async fn parallel_branches_all_contribute() {
    let graph = fan_out_graph(50, 10, 30);
    let result = graph
        .invoke(GraphState::new(MergeState::default()))
        .await
        .expect("Graph failed");

    let messages = result.data.messages;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], "msg from A");
    for id in ["B", "C", "D"] {
        assert!(messages.contains(&format!("msg from {id}")));
    }
}

#[tokio::test]
async fn merge_order_does_not_depend_on_completion_order() {
    let slow_first = fan_out_graph(60, 5, 30)
        .invoke(GraphState::new(MergeState::default()))
        .await
        .unwrap();
    let fast_first = fan_out_graph(5, 60, 30)
        .invoke(GraphState::new(MergeState::default()))
        .await
        .unwrap();

    assert_eq!(slow_first, fast_first);
    assert_eq!(
        slow_first.data.messages,
        vec!["msg from A", "msg from B", "msg from C", "msg from D"]
    );
    assert_eq!(slow_first.data.last_node.as_deref(), Some("D"));
}
