use std::marker::PhantomData;

use async_trait::async_trait;
use schemars::gen::SchemaGenerator;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{GraderError, LlmResponse, Runnable};

const FORMAT_PREAMBLE: &str = "The output should be formatted as a JSON instance that conforms to the JSON schema below.

As an example, for the schema {\"properties\": {\"foo\": {\"title\": \"Foo\", \"description\": \"a list of strings\", \"type\": \"array\", \"items\": {\"type\": \"string\"}}}, \"required\": [\"foo\"]}
the object {\"foo\": [\"bar\", \"baz\"]} is a well-formatted instance of the schema. The object {\"properties\": {\"foo\": [\"bar\", \"baz\"]}} is not well-formatted.

Here is the output schema:";

/// A typed result that model output must decode into.
///
/// The JSON schema is derived from the type with `schemars`; `validate`
/// enforces the constraints that decoding alone cannot (ranges, non-empty
/// strings). A value that fails validation is rejected, never repaired.
pub trait OutputContract: DeserializeOwned + JsonSchema + Send + Sync + 'static {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Returns the part of `raw` most likely to hold a JSON document: the span
/// between the first opening fence and the last closing fence if any, else
/// the outermost `{ ... }` span, else the trimmed text.
///
/// The fence match is greedy so a fence quoted inside a string value does not
/// cut the document short.
pub fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body = after
            .strip_prefix("json")
            .or_else(|| after.strip_prefix("JSON"))
            .unwrap_or(after);
        if let Some(end) = body.rfind("```") {
            return body[..end].trim();
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(open), Some(close)) if open < close => &trimmed[open..=close],
        _ => trimmed,
    }
}

/// A parser that passes model text through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrOutputParser;

#[async_trait]
impl Runnable<LlmResponse, String> for StrOutputParser {
    async fn invoke(&self, input: LlmResponse) -> Result<String, GraderError> {
        Ok(input.content)
    }
}

#[async_trait]
impl Runnable<String, String> for StrOutputParser {
    async fn invoke(&self, input: String) -> Result<String, GraderError> {
        Ok(input)
    }
}

/// A parser that decodes model text into an [`OutputContract`] type and
/// validates it.
pub struct StructuredOutputParser<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for StructuredOutputParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for StructuredOutputParser<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> StructuredOutputParser<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: OutputContract> StructuredOutputParser<T> {
    /// Instructions telling a model exactly which JSON shape to produce.
    pub fn format_instructions(&self) -> String {
        let schema = SchemaGenerator::default().into_root_schema_for::<T>();
        let mut schema = serde_json::to_value(&schema).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut schema {
            map.remove("$schema");
        }
        format!("{FORMAT_PREAMBLE}\n```\n{schema}\n```")
    }

    pub fn parse(&self, raw: &str) -> Result<T, GraderError> {
        let candidate = extract_json_block(raw);
        if candidate.is_empty() {
            return Err(GraderError::parse_failed(raw, "no structured output found"));
        }

        let value: T = serde_json::from_str(candidate)
            .map_err(|err| GraderError::parse_failed(raw, err.to_string()))?;
        value
            .validate()
            .map_err(|reason| GraderError::parse_failed(raw, reason))?;
        Ok(value)
    }
}

#[async_trait]
impl<T: OutputContract> Runnable<String, T> for StructuredOutputParser<T> {
    async fn invoke(&self, input: String) -> Result<T, GraderError> {
        self.parse(&input)
    }
}

#[async_trait]
impl<T: OutputContract> Runnable<LlmResponse, T> for StructuredOutputParser<T> {
    async fn invoke(&self, input: LlmResponse) -> Result<T, GraderError> {
        self.parse(&input.content)
    }
}
