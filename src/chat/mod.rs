//! The single chat turn behind `POST /chat`.

mod orchestrator;
mod prompt;

use serde::Deserialize;

pub use orchestrator::{ChatOrchestrator, ChatResponse, DEFAULT_TOP_K};
pub use prompt::{build_prompt, join_context, CONTEXT_SEPARATOR};

#[derive(Debug, Clone, Deserialize)]
pub struct ChatInput {
    pub message: String,
}
