//! Mnemo - context-aware chat agent
//!
//! A chat agent that feels continuous across independent sessions:
//! - Extracts durable facts from each exchange
//! - Merges them into a long-lived per-identity memory store
//! - Assembles a bounded, relevant context block for each model call

pub mod agent;
pub mod memory;

pub use agent::{ChatAgent, ModelClient, OpenRouterClient};
pub use memory::{ContextAssembler, Fact, FactExtractor, MemoryRecord, MemoryStore, TurnRole};

use std::path::PathBuf;

/// Default character budget for the assembled context block.
pub const DEFAULT_CONTEXT_BUDGET: usize = 4000;

/// Default number of recent turns offered to the context assembler.
pub const DEFAULT_RECENT_TURNS: usize = 10;

/// Configuration for Mnemo
#[derive(Debug, Clone)]
pub struct MnemoConfig {
    /// Path to the durable memory file
    pub memory_file: PathBuf,

    /// Character budget for the assembled context block
    pub context_budget: usize,

    /// How many recent turns the assembler may include
    pub recent_turns: usize,

    /// Model identifier passed to the completion endpoint
    pub model: String,

    /// Base URL of the OpenAI-compatible completion endpoint
    pub api_base: String,
}

impl MnemoConfig {
    pub fn new(memory_file: PathBuf) -> Self {
        Self {
            memory_file,
            context_budget: DEFAULT_CONTEXT_BUDGET,
            recent_turns: DEFAULT_RECENT_TURNS,
            model: "gpt-4o-mini".to_string(),
            api_base: "https://openrouter.ai/api/v1".to_string(),
        }
    }

    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget;
        self
    }

    pub fn with_recent_turns(mut self, turns: usize) -> Self {
        self.recent_turns = turns;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

/// Result type for Mnemo operations
pub type Result<T> = std::result::Result<T, MnemoError>;

/// Errors that can occur in Mnemo
#[derive(Debug, thiserror::Error)]
pub enum MnemoError {
    #[error(
        "stale write for identity '{identity}': record version {given}, store expects {expected}"
    )]
    StaleWrite {
        identity: String,
        given: u64,
        expected: u64,
    },

    #[error("Memory unavailable: {0}")]
    MemoryUnavailable(String),

    #[error("Model API error: {0}")]
    ModelApi(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
