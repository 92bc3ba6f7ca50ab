//! Google Gemini API LLM client

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use grader_core::{GraderError, LlmRequest, LlmResponse, Message, Role, Runnable};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GoogleClient {
    base_url: String,
    api_key: SecretString,
    model: String,
    http: Client,
}

impl fmt::Debug for GoogleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl GoogleClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, GraderError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GraderError::InvalidConfig(err.to_string()))?;
        Ok(Self {
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: SecretString::new(api_key.into()),
            model: model.into(),
            http,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn model_name(&self, request_model: &str) -> String {
        let model = if request_model.is_empty() {
            self.model.as_str()
        } else {
            request_model
        };
        let model = model.trim();
        model.strip_prefix("models/").unwrap_or(model).to_string()
    }

    fn generate_url(&self, request_model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model_name(request_model)
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
    }
}

fn map_contents(messages: &[Message]) -> Vec<Content> {
    messages
        .iter()
        .filter_map(|message| {
            let role = match message.role {
                Role::System => return None,
                Role::User => "user",
                Role::Assistant => "model",
            };
            Some(Content {
                role: Some(role.to_string()),
                parts: vec![text_part(&message.content)],
            })
        })
        .collect()
}

fn system_instruction(messages: &[Message]) -> Option<Content> {
    let parts: Vec<Part> = messages
        .iter()
        .filter(|message| matches!(message.role, Role::System))
        .map(|message| text_part(&message.content))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(Content { role: None, parts })
    }
}

fn build_request(input: &LlmRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: map_contents(&input.messages),
        system_instruction: system_instruction(&input.messages),
    }
}

fn is_blocked_finish_reason(reason: &str) -> bool {
    matches!(reason, "SAFETY" | "RECITATION" | "BLOCKLIST")
}

#[async_trait::async_trait]
impl Runnable<LlmRequest, LlmResponse> for GoogleClient {
    async fn invoke(&self, input: LlmRequest) -> Result<LlmResponse, GraderError> {
        let request = build_request(&input);

        let response = self
            .http
            .post(self.generate_url(&input.model))
            .query(&[("key", self.api_key.expose_secret().as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "gemini request failed");
                GraderError::LlmProvider(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));
            tracing::warn!(status = %status, message = %message, "gemini returned an error");
            return Err(GraderError::LlmProvider(message));
        }

        let response = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|err| GraderError::LlmProvider(err.to_string()))?;

        let candidate = response
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .ok_or_else(|| GraderError::LlmProvider("No candidates in response".to_string()))?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            if let Some(reason) = candidate
                .finish_reason
                .as_deref()
                .filter(|reason| is_blocked_finish_reason(reason))
            {
                tracing::warn!(reason, "gemini blocked generation");
                return Err(GraderError::LlmProvider(format!(
                    "Generation blocked: {}",
                    reason
                )));
            }
        }

        Ok(LlmResponse { content: text })
    }
}
