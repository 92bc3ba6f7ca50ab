use std::collections::HashMap;

use grader_core::StateSchema;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;

use crate::{GraphError, GraphNode, END, START};

pub(crate) struct NodeData<S: StateSchema> {
    pub name: String,
    pub runnable: Box<dyn GraphNode<S>>,
}

/// A validated, acyclic execution plan. Node indices follow declaration
/// order, which is also the order updates are merged within a superstep.
pub(crate) struct GraphProgram<S: StateSchema> {
    graph: DiGraph<NodeData<S>, ()>,
    entries: Vec<NodeIndex>,
    finishes: Vec<NodeIndex>,
}

impl<S: StateSchema> GraphProgram<S> {
    pub(crate) fn compile(
        nodes: Vec<(String, Box<dyn GraphNode<S>>)>,
        edges: Vec<(String, String)>,
    ) -> Result<Self, GraphError> {
        let mut graph: DiGraph<NodeData<S>, ()> = DiGraph::new();
        let mut name_to_index: HashMap<String, NodeIndex> = HashMap::new();

        for (name, runnable) in nodes {
            if name == START || name == END {
                return Err(GraphError::ReservedName { node: name });
            }
            if name_to_index.contains_key(&name) {
                return Err(GraphError::DuplicateNode { node: name });
            }
            let index = graph.add_node(NodeData {
                name: name.clone(),
                runnable,
            });
            name_to_index.insert(name, index);
        }

        let lookup = |name: &str| {
            name_to_index
                .get(name)
                .copied()
                .ok_or_else(|| GraphError::MissingNode {
                    node: name.to_string(),
                })
        };

        let mut entries = Vec::new();
        let mut finishes = Vec::new();
        for (from, to) in &edges {
            match (from.as_str(), to.as_str()) {
                (_, START) | (END, _) | (START, END) => {
                    return Err(GraphError::InvalidEdge {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
                (START, target) => {
                    let index = lookup(target)?;
                    if !entries.contains(&index) {
                        entries.push(index);
                    }
                }
                (source, END) => {
                    let index = lookup(source)?;
                    if !finishes.contains(&index) {
                        finishes.push(index);
                    }
                }
                (source, target) => {
                    let a = lookup(source)?;
                    let b = lookup(target)?;
                    graph.update_edge(a, b, ());
                }
            }
        }

        if entries.is_empty() {
            return Err(GraphError::MissingEntry);
        }

        toposort(&graph, None).map_err(|cycle| GraphError::CycleDetected {
            node: graph[cycle.node_id()].name.clone(),
        })?;

        let mut reached = vec![false; graph.node_count()];
        for &entry in &entries {
            let mut dfs = Dfs::new(&graph, entry);
            while let Some(index) = dfs.next(&graph) {
                reached[index.index()] = true;
            }
        }
        if let Some(index) = graph.node_indices().find(|index| !reached[index.index()]) {
            return Err(GraphError::Unreachable {
                node: graph[index].name.clone(),
            });
        }

        Ok(Self {
            graph,
            entries,
            finishes,
        })
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &NodeData<S> {
        &self.graph[index]
    }

    /// Number of unfinished predecessors per node, indexed by node index.
    pub(crate) fn in_degrees(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|index| {
                self.graph
                    .neighbors_directed(index, Direction::Incoming)
                    .count()
            })
            .collect()
    }

    pub(crate) fn initial_ready(&self, remaining: &[usize]) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|index| remaining[index.index()] == 0)
            .collect()
    }

    /// Marks `index` as finished and pushes every successor whose last
    /// predecessor this was onto `ready`.
    pub(crate) fn release(
        &self,
        index: NodeIndex,
        remaining: &mut [usize],
        ready: &mut Vec<NodeIndex>,
    ) {
        for successor in self.graph.neighbors_directed(index, Direction::Outgoing) {
            let slot = &mut remaining[successor.index()];
            *slot -= 1;
            if *slot == 0 {
                ready.push(successor);
            }
        }
    }

    pub(crate) fn node_names(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|index| self.graph[index].name.clone())
            .collect()
    }

    pub(crate) fn edge_names(&self) -> Vec<(String, String)> {
        let entry_edges = self
            .entries
            .iter()
            .map(|&index| (START.to_string(), self.graph[index].name.clone()));
        let inner_edges = self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()].name.clone(),
                self.graph[edge.target()].name.clone(),
            )
        });
        let finish_edges = self
            .finishes
            .iter()
            .map(|&index| (self.graph[index].name.clone(), END.to_string()));
        entry_edges.chain(inner_edges).chain(finish_edges).collect()
    }

    pub(crate) fn supersteps(&self) -> Vec<Vec<String>> {
        let mut remaining = self.in_degrees();
        let mut ready = self.initial_ready(&remaining);
        let mut waves = Vec::new();
        while !ready.is_empty() {
            let mut next = Vec::new();
            for &index in &ready {
                self.release(index, &mut remaining, &mut next);
            }
            waves.push(
                ready
                    .iter()
                    .map(|&index| self.graph[index].name.clone())
                    .collect(),
            );
            next.sort_unstable();
            ready = next;
        }
        waves
    }
}
