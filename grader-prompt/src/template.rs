use std::collections::HashMap;

use regex::{Captures, Regex};
use grader_core::{GraderError, Runnable, Value};

pub type PromptVars = HashMap<String, Value>;

/// A text template with `{name}` placeholders.
///
/// `{{` and `}}` render as literal braces. Substituted values are never
/// re-scanned, so a value may itself contain braces (JSON schemas, for one).
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    partials: PromptVars,
}

fn placeholder_pattern() -> Result<Regex, GraderError> {
    Regex::new(r"\{\{|\}\}|\{\s*(\w+)\s*\}").map_err(|e| GraderError::InvalidConfig(e.to_string()))
}

fn value_text(value: &Value) -> String {
    value
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| value.to_string())
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            partials: HashMap::new(),
        }
    }

    /// Binds `name` ahead of time; values passed to `render` still win.
    pub fn partial(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.partials.insert(name.into(), value.into());
        self
    }

    /// Placeholders that still need a value at render time, in first-use order.
    pub fn input_variables(&self) -> Vec<String> {
        let Ok(pattern) = placeholder_pattern() else {
            return Vec::new();
        };
        let mut names: Vec<String> = Vec::new();
        for caps in pattern.captures_iter(&self.template) {
            if let Some(name) = caps.get(1) {
                let name = name.as_str();
                if !self.partials.contains_key(name) && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    pub fn render(&self, vars: &PromptVars) -> Result<String, GraderError> {
        let pattern = placeholder_pattern()?;
        let mut missing: Vec<String> = Vec::new();
        let rendered = pattern.replace_all(&self.template, |caps: &Captures<'_>| {
            let Some(name) = caps.get(1) else {
                return caps[0][..1].to_string();
            };
            match vars
                .get(name.as_str())
                .or_else(|| self.partials.get(name.as_str()))
            {
                Some(value) => value_text(value),
                None => {
                    missing.push(name.as_str().to_string());
                    String::new()
                }
            }
        });

        if !missing.is_empty() {
            return Err(GraderError::InvalidConfig(format!(
                "missing prompt variables: {}",
                missing.join(", ")
            )));
        }
        Ok(rendered.into_owned())
    }
}

#[async_trait::async_trait]
impl Runnable<PromptVars, String> for PromptTemplate {
    async fn invoke(&self, input: PromptVars) -> Result<String, GraderError> {
        self.render(&input)
    }
}
