//! Adapters: concrete implementations of the domain ports.

pub mod anthropic;
pub mod sqlite;

pub use anthropic::{AnthropicPlanningConfig, AnthropicPlanningProvider};
pub use sqlite::SqliteTaskGraphRepository;
