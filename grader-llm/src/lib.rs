mod chat_model;

// Provider-specific clients (feature-gated)
pub mod providers;

pub use chat_model::ChatModel;
pub use grader_core::{LlmRequest, LlmResponse, Message, Role};

#[cfg(feature = "google")]
pub use providers::google::GoogleClient;

use grader_core::Runnable;

/// Any request/response model backend. Shared as `Arc<dyn Llm>`.
pub trait Llm: Runnable<LlmRequest, LlmResponse> + Send + Sync {}

impl<T> Llm for T where T: Runnable<LlmRequest, LlmResponse> + Send + Sync {}
