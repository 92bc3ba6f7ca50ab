//! Provider-specific LLM clients

#[cfg(feature = "google")]
pub mod google;
