//! Rubric-based essay grading.
//!
//! An essay is scored on three rubric dimensions by independent model calls
//! that fan out after a topic-generation step and join into a final
//! aggregation step producing a narrative verdict and the mean score.

pub mod config;
pub mod nodes;
pub mod pipeline;
pub mod prompts;
pub mod rubric;
pub mod schema;
pub mod state;

pub use config::{ConfigError, GraderConfig};
pub use pipeline::{build_essay_graph, EssayGrader, GraderSettings, TopicMode};
pub use rubric::Rubric;
pub use schema::EssayScore;
pub use state::{EssayState, EssayUpdate};

/// The essay graded when no path is given to the binary.
pub const SAMPLE_ESSAY: &str = include_str!("../assets/green_revolution.md");
