use grader_core::{GraderError, OutputContract, StructuredOutputParser, Value};
use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;

/// One rubric evaluation as returned by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EssayScore {
    /// Feedback on the written essay.
    #[schemars(length(min = 1))]
    pub feedback: String,
    /// The score for the essay out of 10.
    #[serde(deserialize_with = "whole_number")]
    #[schemars(with = "i64")]
    #[schemars(range(min = 1, max = 10))]
    pub score: i64,
}

/// Accepts `8`, `8.0` and `"8"`; rejects fractions and non-numbers.
fn whole_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let whole = match &value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite() && float.fract() == 0.0)
                .map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    whole.ok_or_else(|| D::Error::custom(format!("expected a whole-number score, got {value}")))
}

impl OutputContract for EssayScore {
    fn validate(&self) -> Result<(), String> {
        if self.feedback.trim().is_empty() {
            return Err("feedback must not be empty".to_string());
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            return Err(format!(
                "score {} is outside the range {MIN_SCORE}..={MAX_SCORE}",
                self.score
            ));
        }
        Ok(())
    }
}

impl EssayScore {
    pub fn parser() -> StructuredOutputParser<EssayScore> {
        StructuredOutputParser::new()
    }

    pub fn formatting_instructions() -> String {
        Self::parser().format_instructions()
    }

    pub fn parse(raw: &str) -> Result<Self, GraderError> {
        Self::parser().parse(raw)
    }
}
