#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use essay_grader::Rubric;
use grader_core::{GraderError, LlmRequest, LlmResponse, Runnable};
use grader_llm::ChatModel;

pub const ESSAY: &str = "Water is the basis of life. Rivers feed farms and cities alike, \
yet groundwater tables fall every year.";

pub const SUMMARY: &str = "A readable essay that needs deeper analysis.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Call {
    Topic,
    Evaluation(Rubric),
    Aggregation,
}

/// A model stub that answers by recognising which task sent the prompt.
///
/// Calls are logged when they complete, so the log order is the order in
/// which replies reached the graph.
pub struct CannedLlm {
    topic: String,
    replies: HashMap<Rubric, String>,
    summary: String,
    delays: HashMap<Call, Duration>,
    failing: Option<Rubric>,
    log: Mutex<Vec<(Call, String)>>,
}

impl Default for CannedLlm {
    fn default() -> Self {
        let replies = HashMap::from([
            (
                Rubric::LanguageControl,
                score_json("Fluent prose with minor slips.", 7),
            ),
            (
                Rubric::ClarityOfThought,
                format!(
                    "```json\n{}\n```",
                    score_json("The argument is easy to follow.", 8)
                ),
            ),
            (
                Rubric::DepthOfAnalysis,
                format!(
                    "Here is my evaluation: {}",
                    score_json("Causes are listed but not examined.", 6)
                ),
            ),
        ]);
        Self {
            topic: "**Topic:** Water scarcity in India".to_string(),
            replies,
            summary: SUMMARY.to_string(),
            delays: HashMap::new(),
            failing: None,
            log: Mutex::new(Vec::new()),
        }
    }
}

pub fn score_json(feedback: &str, score: i64) -> String {
    serde_json::json!({ "feedback": feedback, "score": score }).to_string()
}

impl CannedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, topic: &str) -> Self {
        self.topic = topic.to_string();
        self
    }

    pub fn with_reply(mut self, rubric: Rubric, raw: impl Into<String>) -> Self {
        self.replies.insert(rubric, raw.into());
        self
    }

    pub fn with_delay(mut self, call: Call, delay: Duration) -> Self {
        self.delays.insert(call, delay);
        self
    }

    pub fn failing(mut self, rubric: Rubric) -> Self {
        self.failing = Some(rubric);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().iter().map(|(call, _)| *call).collect()
    }

    pub fn prompts_for(&self, call: Call) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(logged, _)| *logged == call)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    fn classify(prompt: &str) -> Option<Call> {
        if prompt.contains("civil services examinations") {
            return Some(Call::Topic);
        }
        if prompt.starts_with("Generate a summary feedback") {
            return Some(Call::Aggregation);
        }
        Rubric::ALL
            .into_iter()
            .find(|rubric| prompt.contains(&format!("on the basis of {} ", rubric.property())))
            .map(Call::Evaluation)
    }
}

#[async_trait::async_trait]
impl Runnable<LlmRequest, LlmResponse> for CannedLlm {
    async fn invoke(&self, input: LlmRequest) -> Result<LlmResponse, GraderError> {
        let prompt = input
            .messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        let call = Self::classify(&prompt)
            .ok_or_else(|| GraderError::LlmProvider(format!("unexpected prompt: {prompt}")))?;

        if let Some(delay) = self.delays.get(&call) {
            tokio::time::sleep(*delay).await;
        }

        let reply = match call {
            Call::Topic => Ok(self.topic.clone()),
            Call::Evaluation(rubric) if self.failing == Some(rubric) => {
                Err(GraderError::LlmProvider("quota exhausted".to_string()))
            }
            Call::Evaluation(rubric) => Ok(self.replies[&rubric].clone()),
            Call::Aggregation => Ok(self.summary.clone()),
        };

        self.log.lock().unwrap().push((call, prompt));
        reply.map(LlmResponse::new)
    }
}

pub fn model(llm: &Arc<CannedLlm>) -> ChatModel {
    ChatModel::new(llm.clone()).with_model("stub-model")
}
