//! Chat backend implementations.

pub mod completions;
pub mod offline;

// Re-export for convenience
pub use completions::CompletionsClient;
pub use offline::OfflineAssistant;
