mod chain;
mod error;
mod llm;
mod output_parsers;
mod runnable;
pub mod state;
mod value;

pub use chain::{Chain, RunnableExt};
pub use error::GraderError;
pub use llm::{LlmRequest, LlmResponse, Message, Role};
pub use output_parsers::{extract_json_block, OutputContract, StrOutputParser, StructuredOutputParser};
pub use runnable::Runnable;
pub use state::{Append, Assign, GraphState, Reducer, StateSchema, StateUpdate};
pub use value::Value;
