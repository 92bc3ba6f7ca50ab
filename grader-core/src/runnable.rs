use async_trait::async_trait;

use crate::GraderError;

/// A single asynchronous step that turns an input into an output or fails.
///
/// Prompts, models and parsers all implement this so they can be composed
/// with [`RunnableExt::then`](crate::RunnableExt::then).
#[async_trait]
pub trait Runnable<Input: Send + 'static, Output: Send + 'static> {
    async fn invoke(&self, input: Input) -> Result<Output, GraderError>;
}
