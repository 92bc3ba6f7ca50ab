use std::fmt;

use crate::schema::EssayScore;
use crate::state::{EssayState, EssayUpdate};

/// The dimensions an essay is scored on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rubric {
    LanguageControl,
    ClarityOfThought,
    DepthOfAnalysis,
}

impl Rubric {
    pub const ALL: [Rubric; 3] = [
        Rubric::LanguageControl,
        Rubric::ClarityOfThought,
        Rubric::DepthOfAnalysis,
    ];

    /// The property name interpolated into the evaluation prompt.
    pub fn property(self) -> &'static str {
        match self {
            Rubric::LanguageControl => "language control",
            Rubric::ClarityOfThought => "Clarity of thought",
            Rubric::DepthOfAnalysis => "Depth of analysis",
        }
    }

    pub fn node_name(self) -> &'static str {
        match self {
            Rubric::LanguageControl => "get_language_feedback",
            Rubric::ClarityOfThought => "get_cot_feedback",
            Rubric::DepthOfAnalysis => "get_doa_feedback",
        }
    }

    pub fn feedback_field(self) -> &'static str {
        match self {
            Rubric::LanguageControl => "language_feedback",
            Rubric::ClarityOfThought => "cot_feedback",
            Rubric::DepthOfAnalysis => "doa_feedback",
        }
    }

    pub fn feedback(self, state: &EssayState) -> Option<&str> {
        match self {
            Rubric::LanguageControl => state.language_feedback.as_deref(),
            Rubric::ClarityOfThought => state.cot_feedback.as_deref(),
            Rubric::DepthOfAnalysis => state.doa_feedback.as_deref(),
        }
    }

    /// The partial update an evaluation contributes: its feedback field plus
    /// one score.
    pub fn update(self, result: EssayScore) -> EssayUpdate {
        let mut update = EssayUpdate {
            individual_scores: vec![result.score],
            ..EssayUpdate::default()
        };
        let feedback = Some(result.feedback);
        match self {
            Rubric::LanguageControl => update.language_feedback = feedback,
            Rubric::ClarityOfThought => update.cot_feedback = feedback,
            Rubric::DepthOfAnalysis => update.doa_feedback = feedback,
        }
        update
    }
}

impl fmt::Display for Rubric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property())
    }
}
