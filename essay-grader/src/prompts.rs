use std::collections::HashMap;

use grader_core::{GraderError, Value};
use grader_prompt::{PromptTemplate, PromptVars};

/// Fixed instruction for the topic-generation call.
pub const TOPIC_INSTRUCTION: &str = "Generate one essay topic of the kind frequently set in civil services examinations (IAS, IPS, KPSC) to help aspirants practise. Return only the topic itself: no options, no numbering, no preamble and no explanation.";

const EVALUATION_TEMPLATE: &str = "For the below essay, evaluate the below essay on the basis of {property} and provide the feedback along with score out of 10 for the written essay\nessay->{essay}\n{instruction}";

const TOPICAL_EVALUATION_TEMPLATE: &str = "For the below essay, written on the topic \"{topic}\", evaluate the below essay on the basis of {property} and provide the feedback along with score out of 10 for the written essay\nessay->{essay}\n{instruction}";

const AGGREGATION_TEMPLATE: &str = "Generate a summary feedback on the below properties of the essay: language control, depth of analysis and clarity of thought.\nlanguage control -> {lc}\ndepth of analysis -> {doa}\nclarity of thought -> {cot}\n";

fn vars<const N: usize>(pairs: [(&str, &str); N]) -> PromptVars {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), Value::from(value)))
        .collect::<HashMap<_, _>>()
}

pub fn evaluation_template(formatting_instructions: &str) -> PromptTemplate {
    PromptTemplate::new(EVALUATION_TEMPLATE).partial("instruction", formatting_instructions)
}

pub fn build_evaluation_prompt(
    essay: &str,
    property: &str,
    formatting_instructions: &str,
) -> Result<String, GraderError> {
    evaluation_template(formatting_instructions)
        .render(&vars([("essay", essay), ("property", property)]))
}

/// Same as [`build_evaluation_prompt`] but also tells the reader which topic
/// the essay was written on.
pub fn build_topical_evaluation_prompt(
    essay: &str,
    topic: &str,
    property: &str,
    formatting_instructions: &str,
) -> Result<String, GraderError> {
    PromptTemplate::new(TOPICAL_EVALUATION_TEMPLATE)
        .partial("instruction", formatting_instructions)
        .render(&vars([
            ("essay", essay),
            ("topic", topic),
            ("property", property),
        ]))
}

pub fn build_aggregation_prompt(
    language_feedback: &str,
    depth_feedback: &str,
    clarity_feedback: &str,
) -> Result<String, GraderError> {
    PromptTemplate::new(AGGREGATION_TEMPLATE).render(&vars([
        ("lc", language_feedback),
        ("doa", depth_feedback),
        ("cot", clarity_feedback),
    ]))
}

/// Reduces a model's topic reply to the bare topic: first non-empty line,
/// without heading marks, a leading "Topic:" label, or a wrapping emphasis or
/// quote pair.
pub fn clean_topic(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    let line = strip_wrapping(line.trim_start_matches('#'));

    let line = match line.split_once(':') {
        Some((label, rest))
            if matches!(
                label.trim_matches(is_emphasis).trim().to_ascii_lowercase().as_str(),
                "topic" | "essay topic"
            ) =>
        {
            strip_wrapping(rest.trim_start_matches(is_emphasis))
        }
        _ => line,
    };
    line.to_string()
}

/// Opening and closing markers removed from around a topic.
const WRAPPERS: [(&str, &str); 8] = [
    ("**", "**"),
    ("__", "__"),
    ("*", "*"),
    ("_", "_"),
    ("`", "`"),
    ("\"", "\""),
    ("'", "'"),
    ("\u{201c}", "\u{201d}"),
];

fn is_emphasis(c: char) -> bool {
    matches!(c, '*' | '_')
}

/// Peels matched marker pairs off both ends. A pair is only removed when the
/// closing marker does not also occur inside, so `"A" or "B"` stays intact.
fn strip_wrapping(text: &str) -> &str {
    let mut text = text.trim();
    loop {
        let peeled = WRAPPERS.iter().find_map(|(open, close)| {
            let inner = text.strip_prefix(open)?.strip_suffix(close)?;
            (!inner.contains(close)).then(|| inner.trim())
        });
        match peeled {
            Some(inner) => text = inner,
            None => return text,
        }
    }
}
