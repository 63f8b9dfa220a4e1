use thiserror::Error;

pub const EMPTY_PROMPT_MESSAGE: &str = "Please enter a prompt";
pub const ALL_ITEMS_FAILED_MESSAGE: &str = "All images failed to load";

/// Run-level outcomes the user is told about. Item failures never show up
/// here on their own; they only count towards `AllItemsFailed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Please enter a prompt")]
    EmptyPrompt,
    #[error("Failed to improve prompt: {0}")]
    Enhancement(String),
    #[error("All images failed to load")]
    AllItemsFailed,
    #[error("run {run_id} was superseded by a newer run")]
    Superseded { run_id: u64 },
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::EmptyPrompt => "validation",
            GenerationError::Enhancement(_) => "enhancement",
            GenerationError::AllItemsFailed => "all_items_failed",
            GenerationError::Superseded { .. } => "superseded",
        }
    }
}

/// Final failure of one image after its retries ran out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("image {index} failed after {attempts} attempt(s): {message}")]
pub struct ItemLoadError {
    pub index: usize,
    pub attempts: u32,
    pub message: String,
}
