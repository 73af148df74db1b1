//! # studychat - streaming chat for a homework tracker
//!
//! Sends a conversation to a completion endpoint and reads the answer as it
//! streams in, handing the growing text to the caller after every fragment.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Incremental Server-Sent Events reader that survives malformed events,
//!   multi-byte characters split across chunks and events split across chunks
//! - HTTP backend for Chat Completions style endpoints
//! - Offline backend with canned study tips
//! - Conversation history with the homework-assistant system prompt
//!
//! ## Architecture
//!
//! - **[`StreamAccumulator`]**: drains an event-stream response and reports
//!   `on_update` / `on_finish`
//! - **[`ChatBackend`]**: opens a streaming response for a [`ChatRequest`]
//! - **[`Conversation`](session::Conversation)**: keeps history and runs one
//!   turn at a time
//!
//! ## Example
//! ```no_run
//! use studychat::options::{HttpTransport, ModelOptions, SessionOptions, TransportOptions};
//! use studychat::providers::CompletionsClient;
//! use studychat::session::Conversation;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CompletionsClient::new(
//!         ModelOptions::default().with_model("gpt-4o".to_string()),
//!         TransportOptions::new(HttpTransport::new("your-api-key")),
//!     )?;
//!
//!     let mut conversation = Conversation::new(SessionOptions::default());
//!     let reply = conversation
//!         .send(&client, "How do I outline an essay?", |partial| {
//!             println!("{partial}");
//!         })
//!         .await?;
//!
//!     println!("{:?}", reply);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod session;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ChatBackend, ClientError};
pub use model::{ChatCompletionChunk, ChatMessage, ChatRequest, Role, Sender, WireMessage};
pub use session::Conversation;
pub use sse::LineSplitting;
pub use stream::{ChunkedResponse, StreamAccumulator, StreamingResponse};
