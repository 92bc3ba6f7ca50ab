use std::sync::Arc;

use grader_core::{GraderError, LlmRequest, LlmResponse, Message, Runnable};

use crate::Llm;

/// The single prompt-in, text-out boundary every task talks to.
///
/// Constructed once and handed to each task, so tests can swap the backend
/// for a stub. Safe to call concurrently; it holds no per-call state.
#[derive(Clone)]
pub struct ChatModel {
    llm: Arc<dyn Llm>,
    model: String,
    system: Option<String>,
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("model", &self.model)
            .field("system", &self.system)
            .finish_non_exhaustive()
    }
}

impl ChatModel {
    /// An empty model name lets the backend use its own default.
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            model: String::new(),
            system: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request(&self, prompt: impl Into<String>) -> LlmRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));
        LlmRequest {
            model: self.model.clone(),
            messages,
        }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, GraderError> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "model call");
        let response = self.llm.invoke(self.request(prompt)).await?;
        Ok(response.content)
    }
}

#[async_trait::async_trait]
impl Runnable<String, LlmResponse> for ChatModel {
    async fn invoke(&self, input: String) -> Result<LlmResponse, GraderError> {
        tracing::debug!(model = %self.model, prompt_chars = input.len(), "model call");
        self.llm.invoke(self.request(input)).await
    }
}
