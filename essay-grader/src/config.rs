use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use grader_core::GraderError;
use grader_graph::ExecutionConfig;
use grader_llm::{ChatModel, GoogleClient};
use thiserror::Error;

use crate::pipeline::{GraderSettings, TopicMode};

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const API_KEY_FALLBACK_VAR: &str = "GEMINI_API_KEY";
pub const MODEL_VAR: &str = "GRADER_MODEL";
pub const BASE_URL_VAR: &str = "GRADER_BASE_URL";
pub const TOPIC_MODE_VAR: &str = "GRADER_TOPIC_MODE";
pub const MAX_CONCURRENCY_VAR: &str = "GRADER_MAX_CONCURRENCY";
pub const NODE_TIMEOUT_VAR: &str = "GRADER_NODE_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API key: set GOOGLE_API_KEY or GEMINI_API_KEY")]
    MissingApiKey,
    #[error("invalid GRADER_TOPIC_MODE: {0}")]
    InvalidTopicMode(String),
    #[error("invalid {var}=`{value}`: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to create model client: {0}")]
    Client(#[from] GraderError),
}

/// Everything the binary needs to build a grader.
#[derive(Clone)]
pub struct GraderConfig {
    api_key: Option<String>,
    model: String,
    base_url: Option<String>,
    topic_mode: TopicMode,
    max_concurrency: Option<usize>,
    node_timeout: Option<Duration>,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            topic_mode: TopicMode::default(),
            max_concurrency: None,
            node_timeout: None,
        }
    }
}

impl fmt::Debug for GraderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };

        f.debug_struct("GraderConfig")
            .field("api_key", &api_key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("topic_mode", &self.topic_mode)
            .field("max_concurrency", &self.max_concurrency)
            .field("node_timeout", &self.node_timeout)
            .finish()
    }
}

impl GraderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut config = Self::default();
        if let Some(key) = get(API_KEY_VAR).or_else(|| get(API_KEY_FALLBACK_VAR)) {
            config = config.api_key(key);
        }
        if let Some(model) = get(MODEL_VAR) {
            config = config.model(model.trim());
        }
        if let Some(base_url) = get(BASE_URL_VAR) {
            config = config.base_url(base_url.trim());
        }
        if let Some(mode) = get(TOPIC_MODE_VAR) {
            let mode = mode.parse().map_err(ConfigError::InvalidTopicMode)?;
            config = config.topic_mode(mode);
        }
        if let Some(value) = get(MAX_CONCURRENCY_VAR) {
            config = config.max_concurrency(parse_positive(MAX_CONCURRENCY_VAR, &value)?);
        }
        if let Some(value) = get(NODE_TIMEOUT_VAR) {
            let secs = parse_positive(NODE_TIMEOUT_VAR, &value)?;
            config = config.node_timeout(Duration::from_secs(secs as u64));
        }
        Ok(config)
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.api_key = if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        };
        self
    }

    pub fn model(mut self, value: impl Into<String>) -> Self {
        self.model = value.into();
        self
    }

    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = Some(value.into());
        self
    }

    pub fn topic_mode(mut self, mode: TopicMode) -> Self {
        self.topic_mode = mode;
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn settings(&self) -> GraderSettings {
        GraderSettings {
            topic_mode: self.topic_mode,
            execution: ExecutionConfig {
                max_concurrency: self.max_concurrency,
                node_timeout: self.node_timeout,
            },
        }
    }

    /// Builds the Gemini-backed model handle shared by every node.
    pub fn chat_model(&self) -> Result<ChatModel, ConfigError> {
        let api_key = self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)?;
        let mut client = GoogleClient::new(api_key, self.model.as_str())?;
        if let Some(base_url) = &self.base_url {
            client = client.with_base_url(base_url.as_str());
        }
        Ok(ChatModel::new(Arc::new(client)).with_model(self.model.as_str()))
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    match value.trim().parse::<usize>() {
        Ok(0) => Err(invalid("must be greater than zero")),
        Ok(parsed) => Ok(parsed),
        Err(err) => Err(invalid(&err.to_string())),
    }
}
