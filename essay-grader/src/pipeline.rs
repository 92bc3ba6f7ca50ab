//! Wiring of the grading graph and the facade that runs it.

use std::fmt;
use std::str::FromStr;

use grader_graph::{
    ExecutableGraph, ExecutionConfig, ExecutionOptions, GraphBuilder, GraphError, GraphState, END,
    START,
};
use grader_llm::ChatModel;
use serde::{Deserialize, Serialize};

use crate::nodes::{AggregationNode, EvaluationNode, TopicNode, GENERATE_TOPIC, GET_FINAL_FEEDBACK};
use crate::rubric::Rubric;
use crate::state::EssayState;

/// What the graph does with the essay topic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicMode {
    /// Generate a topic and record it in the final state. Evaluations do not
    /// see it.
    #[default]
    Generate,
    /// Generate a topic (unless one was supplied) and mention it in every
    /// evaluation prompt.
    Contextual,
    /// No topic step; the evaluations start immediately.
    Skip,
}

impl TopicMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TopicMode::Generate => "generate",
            TopicMode::Contextual => "contextual",
            TopicMode::Skip => "skip",
        }
    }
}

impl fmt::Display for TopicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "generate" => Ok(TopicMode::Generate),
            "contextual" => Ok(TopicMode::Contextual),
            "skip" => Ok(TopicMode::Skip),
            other => Err(format!(
                "unknown topic mode `{other}` (expected generate, contextual or skip)"
            )),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraderSettings {
    pub topic_mode: TopicMode,
    pub execution: ExecutionConfig,
}

/// Builds the grading graph:
///
/// ```text
/// START -> generate_topic -> {get_language_feedback, get_cot_feedback, get_doa_feedback}
///       -> get_final_feedback -> END
/// ```
///
/// With [`TopicMode::Skip`] the three evaluations hang directly off `START`.
pub fn build_essay_graph(
    model: &ChatModel,
    settings: &GraderSettings,
) -> Result<ExecutableGraph<EssayState>, GraphError> {
    let mut builder = GraphBuilder::new().with_default_config(settings.execution.clone());

    let fan_out_from = match settings.topic_mode {
        TopicMode::Skip => START,
        TopicMode::Generate | TopicMode::Contextual => {
            builder = builder
                .add_node(GENERATE_TOPIC, TopicNode::new(model.clone()))
                .add_edge(START, GENERATE_TOPIC);
            GENERATE_TOPIC
        }
    };

    let include_topic = settings.topic_mode == TopicMode::Contextual;
    for rubric in Rubric::ALL {
        builder = builder
            .add_node(
                rubric.node_name(),
                EvaluationNode::new(rubric, model.clone()).with_topic(include_topic),
            )
            .add_edge(fan_out_from, rubric.node_name())
            .add_edge(rubric.node_name(), GET_FINAL_FEEDBACK);
    }

    builder
        .add_node(GET_FINAL_FEEDBACK, AggregationNode::new(model.clone()))
        .add_edge(GET_FINAL_FEEDBACK, END)
        .build()
}

/// Grades essays with one compiled graph.
///
/// The graph holds no per-run state, so one grader can serve many essays,
/// including concurrently.
pub struct EssayGrader {
    graph: ExecutableGraph<EssayState>,
    settings: GraderSettings,
}

impl EssayGrader {
    pub fn new(model: ChatModel, settings: GraderSettings) -> Result<Self, GraphError> {
        let graph = build_essay_graph(&model, &settings)?;
        Ok(Self { graph, settings })
    }

    pub fn graph(&self) -> &ExecutableGraph<EssayState> {
        &self.graph
    }

    pub fn settings(&self) -> &GraderSettings {
        &self.settings
    }

    pub async fn grade(&self, essay: &str) -> Result<EssayState, GraphError> {
        self.run(EssayState::new(essay), ExecutionOptions::default())
            .await
    }

    /// Grades an essay written on a known topic. The topic step keeps the
    /// supplied topic instead of asking the model for one.
    pub async fn grade_with_topic(
        &self,
        essay: &str,
        topic: &str,
    ) -> Result<EssayState, GraphError> {
        self.run(
            EssayState::new(essay).with_topic(topic),
            ExecutionOptions::default(),
        )
        .await
    }

    pub async fn grade_with_options(
        &self,
        state: EssayState,
        options: ExecutionOptions,
    ) -> Result<EssayState, GraphError> {
        self.run(state, options).await
    }

    async fn run(
        &self,
        state: EssayState,
        options: ExecutionOptions,
    ) -> Result<EssayState, GraphError> {
        let finished = self
            .graph
            .invoke_with_options(GraphState::new(state), options)
            .await?;
        Ok(finished.into_inner())
    }
}
