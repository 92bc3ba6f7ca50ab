//! The five tasks of the grading graph.

use grader_core::{
    Chain, GraderError, GraphState, LlmResponse, Runnable, RunnableExt, StateUpdate,
    StrOutputParser, StructuredOutputParser,
};
use grader_graph::{GraphContext, GraphNode};
use grader_llm::ChatModel;

use crate::prompts::{
    build_aggregation_prompt, build_evaluation_prompt, build_topical_evaluation_prompt,
    clean_topic, TOPIC_INSTRUCTION,
};
use crate::rubric::Rubric;
use crate::schema::EssayScore;
use crate::state::{EssayState, EssayUpdate};

pub const GENERATE_TOPIC: &str = "generate_topic";
pub const GET_FINAL_FEEDBACK: &str = "get_final_feedback";

type TextChain = Chain<ChatModel, StrOutputParser, LlmResponse>;
type ScoreChain = Chain<ChatModel, StructuredOutputParser<EssayScore>, LlmResponse>;

/// Asks the model for an exam-style essay topic.
///
/// A topic already present in the state is kept and no call is made.
pub struct TopicNode {
    chain: TextChain,
}

impl TopicNode {
    pub fn new(model: ChatModel) -> Self {
        Self {
            chain: model.then(StrOutputParser),
        }
    }
}

#[async_trait::async_trait]
impl GraphNode<EssayState> for TopicNode {
    async fn invoke_with_context(
        &self,
        input: GraphState<EssayState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<EssayState>, GraderError> {
        if let Some(topic) = &input.data.essay_topic {
            tracing::info!(topic = %topic, "using supplied essay topic");
            return Ok(StateUpdate::new(EssayUpdate::default()));
        }

        let raw: String = self.chain.invoke(TOPIC_INSTRUCTION.to_string()).await?;
        let topic = clean_topic(&raw);
        tracing::info!(topic = %topic, "generated essay topic");
        Ok(StateUpdate::new(EssayUpdate {
            essay_topic: Some(topic),
            ..EssayUpdate::default()
        }))
    }
}

/// Scores the essay on one rubric dimension.
pub struct EvaluationNode {
    rubric: Rubric,
    chain: ScoreChain,
    instructions: String,
    include_topic: bool,
}

impl EvaluationNode {
    pub fn new(rubric: Rubric, model: ChatModel) -> Self {
        let parser = EssayScore::parser();
        Self {
            rubric,
            instructions: parser.format_instructions(),
            chain: model.then(parser),
            include_topic: false,
        }
    }

    /// Mention the essay topic in the prompt when the state carries one.
    pub fn with_topic(mut self, include_topic: bool) -> Self {
        self.include_topic = include_topic;
        self
    }

    fn prompt(&self, state: &EssayState) -> Result<String, GraderError> {
        let property = self.rubric.property();
        match state.essay_topic.as_deref() {
            Some(topic) if self.include_topic => {
                build_topical_evaluation_prompt(&state.essay, topic, property, &self.instructions)
            }
            _ => build_evaluation_prompt(&state.essay, property, &self.instructions),
        }
    }
}

#[async_trait::async_trait]
impl GraphNode<EssayState> for EvaluationNode {
    async fn invoke_with_context(
        &self,
        input: GraphState<EssayState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<EssayState>, GraderError> {
        let prompt = self.prompt(&input.data)?;
        let result: EssayScore = self.chain.invoke(prompt).await?;
        tracing::info!(rubric = %self.rubric, score = result.score, "essay evaluated");
        Ok(StateUpdate::new(self.rubric.update(result)))
    }
}

/// Mean of the collected scores.
pub fn average_score(scores: &[i64]) -> Result<f64, GraderError> {
    if scores.is_empty() {
        return Err(GraderError::JoinPrecondition(
            "no scores to average".to_string(),
        ));
    }
    let total: i64 = scores.iter().sum();
    Ok(total as f64 / scores.len() as f64)
}

/// Joins the evaluations: asks for a narrative summary of the three
/// feedbacks and averages the scores.
pub struct AggregationNode {
    chain: TextChain,
    expected_scores: usize,
}

impl AggregationNode {
    pub fn new(model: ChatModel) -> Self {
        Self {
            chain: model.then(StrOutputParser),
            expected_scores: Rubric::ALL.len(),
        }
    }

    fn check_join(&self, state: &EssayState) -> Result<(), GraderError> {
        let missing = state.missing_feedback();
        if !missing.is_empty() {
            return Err(GraderError::JoinPrecondition(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        if state.individual_scores.len() != self.expected_scores {
            return Err(GraderError::JoinPrecondition(format!(
                "expected {} scores, found {}",
                self.expected_scores,
                state.individual_scores.len()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl GraphNode<EssayState> for AggregationNode {
    async fn invoke_with_context(
        &self,
        input: GraphState<EssayState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<EssayState>, GraderError> {
        let state = &input.data;
        self.check_join(state)?;

        let feedback = |rubric: Rubric| rubric.feedback(state).unwrap_or_default();
        let prompt = build_aggregation_prompt(
            feedback(Rubric::LanguageControl),
            feedback(Rubric::DepthOfAnalysis),
            feedback(Rubric::ClarityOfThought),
        )?;

        let final_feedback: String = self.chain.invoke(prompt).await?;
        let average = average_score(&state.individual_scores)?;
        tracing::info!(average_score = average, "essay graded");

        Ok(StateUpdate::new(EssayUpdate {
            final_feedback: Some(final_feedback),
            average_score: Some(average),
            ..EssayUpdate::default()
        }))
    }
}
