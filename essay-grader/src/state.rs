use grader_core::state::{Append, Assign, Reducer};
use grader_core::StateSchema;
use serde::{Deserialize, Serialize};

use crate::rubric::Rubric;

/// The record threaded through the grading graph.
///
/// Every produced field starts as `None` and is written once by its task.
/// `individual_scores` is the only field several tasks write; their
/// contributions are concatenated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EssayState {
    pub essay_topic: Option<String>,
    pub essay: String,
    pub language_feedback: Option<String>,
    pub cot_feedback: Option<String>,
    pub doa_feedback: Option<String>,
    pub final_feedback: Option<String>,
    #[serde(default)]
    pub individual_scores: Vec<i64>,
    pub average_score: Option<f64>,
}

impl EssayState {
    pub fn new(essay: impl Into<String>) -> Self {
        Self {
            essay: essay.into(),
            ..Self::default()
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.essay_topic = Some(topic.into());
        self
    }

    /// Rubric feedback fields that are still unset.
    pub fn missing_feedback(&self) -> Vec<&'static str> {
        Rubric::ALL
            .into_iter()
            .filter(|rubric| rubric.feedback(self).is_none())
            .map(Rubric::feedback_field)
            .collect()
    }
}

/// A partial write to [`EssayState`]. `None` leaves a field untouched; scores
/// are appended.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EssayUpdate {
    pub essay_topic: Option<String>,
    pub language_feedback: Option<String>,
    pub cot_feedback: Option<String>,
    pub doa_feedback: Option<String>,
    pub final_feedback: Option<String>,
    #[serde(default)]
    pub individual_scores: Vec<i64>,
    pub average_score: Option<f64>,
}

impl StateSchema for EssayState {
    type Update = EssayUpdate;

    fn apply(current: &Self, update: EssayUpdate) -> Self {
        Self {
            essay_topic: Assign.reduce(current.essay_topic.clone(), update.essay_topic),
            essay: current.essay.clone(),
            language_feedback: Assign
                .reduce(current.language_feedback.clone(), update.language_feedback),
            cot_feedback: Assign.reduce(current.cot_feedback.clone(), update.cot_feedback),
            doa_feedback: Assign.reduce(current.doa_feedback.clone(), update.doa_feedback),
            final_feedback: Assign.reduce(current.final_feedback.clone(), update.final_feedback),
            individual_scores: Append.reduce(
                current.individual_scores.clone(),
                update.individual_scores,
            ),
            average_score: Assign.reduce(current.average_score, update.average_score),
        }
    }
}
