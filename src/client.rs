//! Backend trait and error types.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::model::ChatRequest;
use crate::stream::{StreamAccumulator, StreamingResponse};

/// Errors that can occur while talking to a completion endpoint.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The endpoint answered with a non-success status.
    #[error("HTTP error! status: {0}")]
    Response(StatusCode),

    #[error("Response body is not readable")]
    UnreadableStream,

    /// The transport failed after the stream had started.
    #[error("Error reading from stream: {0}")]
    StreamRead(#[source] std::io::Error),

    /// A single event payload could not be decoded. Logged, never fatal.
    #[error("Malformed event payload {payload:?}: {source}")]
    MalformedEvent {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A source of streamed chat completions.
///
/// Implement this trait to plug a new endpoint into a
/// [`Conversation`](crate::session::Conversation).
///
/// # Required Methods
/// - `open_stream`: send the request and hand back the unread response
///
/// # Provided Methods
/// - `chat_stream`: open a stream and drain it through a [`StreamAccumulator`]
///
/// # Example
/// ```rust,ignore
/// struct MyBackend;
///
/// #[async_trait]
/// impl ChatBackend for MyBackend {
///     type Response = reqwest::Response;
///
///     async fn open_stream(&self, request: ChatRequest) -> Result<Self::Response, ClientError> {
///         Ok(reqwest::Client::new().post(URL).json(&request).send().await?)
///     }
/// }
/// ```
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Response type handed to the accumulator.
    type Response: StreamingResponse;

    /// Issue the request and return the response without reading its body.
    ///
    /// Status checks are left to the accumulator so that a failing status is
    /// reported the same way for every backend.
    async fn open_stream(&self, request: ChatRequest) -> Result<Self::Response, ClientError>;

    /// Open a stream and deliver its text through the two callbacks.
    ///
    /// `on_update` receives the full text received so far after every delta;
    /// `on_finish` receives the final text once the stream has drained.
    async fn chat_stream<U, F>(
        &self,
        request: ChatRequest,
        on_update: U,
        on_finish: F,
    ) -> Result<(), ClientError>
    where
        U: FnMut(&str) + Send,
        F: FnOnce(&str) + Send,
    {
        let response = self.open_stream(request).await?;
        StreamAccumulator::default()
            .consume(response, on_update, on_finish)
            .await
    }
}
