//! Incremental reader for streamed completions.
//!
//! [`StreamAccumulator`] drains an event-stream response body, pulls the text
//! delta out of each `data:` event and reports the growing message to the
//! caller:
//!
//! ```text
//! Idle -> Reading -> (Draining -> Reading)* -> Finished
//!           |
//!           +-> Failed (transport error, no finish)
//! ```
//!
//! A status or body problem fails the call before anything is read. A broken
//! event payload is logged and skipped.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::client::ClientError;
use crate::model::ChatCompletionChunk;
use crate::sse::{is_done_marker, parse_sse_line, LineBuffer, LineSplitting, Utf8Decoder};

/// Raw body chunks of a streaming response.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// A response whose body can be read incrementally.
pub trait StreamingResponse: Send {
    /// HTTP status of the response.
    fn status(&self) -> StatusCode;

    /// Take the body as a stream of byte chunks.
    ///
    /// Fails with [`ClientError::UnreadableStream`] when there is no body to
    /// read.
    fn into_byte_stream(self) -> Result<ByteStream, ClientError>;
}

impl StreamingResponse for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }

    fn into_byte_stream(self) -> Result<ByteStream, ClientError> {
        Ok(self.bytes_stream().map_err(std::io::Error::other).boxed())
    }
}

/// An in-memory response, built from a status and a body stream.
///
/// Used by [`OfflineAssistant`](crate::providers::OfflineAssistant) and handy
/// for feeding hand-made chunk sequences to the accumulator.
pub struct ChunkedResponse {
    status: StatusCode,
    body: Option<ByteStream>,
}

impl ChunkedResponse {
    /// A `200 OK` response whose body yields `chunks` in order.
    pub fn ok<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            chunks.into_iter().map(|chunk| Ok(chunk.into())).collect();
        Self::from_stream(StatusCode::OK, stream::iter(chunks).boxed())
    }

    pub fn from_stream(status: StatusCode, body: ByteStream) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// A response that failed with `status` and has an empty body.
    pub fn with_status(status: StatusCode) -> Self {
        Self::from_stream(status, stream::empty().boxed())
    }

    /// A successful response with no body at all.
    pub fn without_body() -> Self {
        Self {
            status: StatusCode::OK,
            body: None,
        }
    }
}

impl StreamingResponse for ChunkedResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn into_byte_stream(self) -> Result<ByteStream, ClientError> {
        self.body.ok_or(ClientError::UnreadableStream)
    }
}

/// Pull the text delta out of one line of an event stream.
///
/// Returns `Ok(None)` for lines that carry no text: non-`data:` lines, the
/// `[DONE]` sentinel, and events without content in their first choice.
/// A payload that is not a valid chunk is a [`ClientError::MalformedEvent`].
pub fn extract_delta(line: &str) -> Result<Option<String>, ClientError> {
    let Some(payload) = parse_sse_line(line) else {
        return Ok(None);
    };
    if is_done_marker(payload) {
        return Ok(None);
    }

    let chunk: ChatCompletionChunk =
        serde_json::from_str(payload).map_err(|source| ClientError::MalformedEvent {
            payload: payload.to_string(),
            source,
        })?;
    trace!(?chunk, "parsed event");

    Ok(chunk.into_first_content())
}

/// Turns an event-stream response into an accumulating text message.
///
/// Holds only configuration; every [`consume`](Self::consume) call starts from
/// an empty message, so one accumulator can serve any number of responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamAccumulator {
    line_splitting: LineSplitting,
}

impl StreamAccumulator {
    pub fn new(line_splitting: LineSplitting) -> Self {
        Self { line_splitting }
    }

    pub fn line_splitting(&self) -> LineSplitting {
        self.line_splitting
    }

    /// Read `response` to the end.
    ///
    /// `on_update` is called with the whole message after each non-empty
    /// delta. `on_finish` is called once with the final message after the body
    /// is drained; it is not called when this returns an error.
    ///
    /// # Errors
    /// - [`ClientError::Response`] if the status is not a success
    /// - [`ClientError::UnreadableStream`] if the body cannot be read
    /// - [`ClientError::StreamRead`] if the transport fails mid-stream
    pub async fn consume<R, U, F>(
        &self,
        response: R,
        mut on_update: U,
        on_finish: F,
    ) -> Result<(), ClientError>
    where
        R: StreamingResponse,
        U: FnMut(&str),
        F: FnOnce(&str),
    {
        let status = response.status();
        if !status.is_success() {
            warn!(%status, "refusing to read unsuccessful response");
            return Err(ClientError::Response(status));
        }

        let mut body = response.into_byte_stream()?;
        let mut decoder = Utf8Decoder::new();
        let mut lines = LineBuffer::new(self.line_splitting);
        let mut message = String::new();
        debug!(line_splitting = ?self.line_splitting, "reading event stream");

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                warn!(error = %e, received = message.len(), "event stream failed");
                ClientError::StreamRead(e)
            })?;
            trace!(bytes = chunk.len(), "received chunk");

            let text = decoder.decode(&chunk);
            for line in lines.push(&text) {
                apply_line(&line, &mut message, &mut on_update);
            }
        }

        let tail = decoder.finish();
        for line in lines.push(&tail).into_iter().chain(lines.finish()) {
            apply_line(&line, &mut message, &mut on_update);
        }

        debug!(bytes = message.len(), "event stream finished");
        on_finish(&message);
        Ok(())
    }

    /// Run [`consume`](Self::consume) on its own tokio task.
    ///
    /// Aborting the returned handle drops the response body and stops the
    /// stream; no callback runs after that.
    pub fn spawn<R, U, F>(
        self,
        response: R,
        on_update: U,
        on_finish: F,
    ) -> JoinHandle<Result<(), ClientError>>
    where
        R: StreamingResponse + 'static,
        U: FnMut(&str) + Send + 'static,
        F: FnOnce(&str) + Send + 'static,
    {
        tokio::spawn(async move { self.consume(response, on_update, on_finish).await })
    }
}

fn apply_line<U>(line: &str, message: &mut String, on_update: &mut U)
where
    U: FnMut(&str),
{
    match extract_delta(line) {
        Ok(Some(delta)) => {
            message.push_str(&delta);
            on_update(message.as_str());
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "skipping malformed event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn event(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::to_string(&ChatCompletionChunk::text(content)).unwrap()
        )
    }

    /// Drain `response`, returning the result, every update, and the finish value.
    async fn run<R: StreamingResponse>(
        accumulator: StreamAccumulator,
        response: R,
    ) -> (Result<(), ClientError>, Vec<String>, Option<String>) {
        let mut updates = Vec::new();
        let mut finished = None;
        let result = accumulator
            .consume(
                response,
                |text| updates.push(text.to_string()),
                |text| finished = Some(text.to_string()),
            )
            .await;
        (result, updates, finished)
    }

    #[tokio::test]
    async fn test_two_chunk_greeting() {
        let response = ChunkedResponse::ok([
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n".to_string(),
            "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\ndata: [DONE]\n\n"
                .to_string(),
        ]);

        let (result, updates, finished) = run(StreamAccumulator::default(), response).await;
        assert!(result.is_ok());
        assert_eq!(updates, vec!["Hi", "Hi there"]);
        assert_eq!(finished.as_deref(), Some("Hi there"));
    }

    #[tokio::test]
    async fn test_empty_stream_finishes_with_empty_text() {
        let response = ChunkedResponse::ok(Vec::<Bytes>::new());
        let (result, updates, finished) = run(StreamAccumulator::default(), response).await;
        assert!(result.is_ok());
        assert!(updates.is_empty());
        assert_eq!(finished.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_updates_grow_by_prefix_and_end_at_finish() {
        let fragments = ["The ", "", "quick ", "brown ", "fox"];
        let mut body: Vec<String> = fragments.iter().map(|f| event(f)).collect();
        body.push("data: [DONE]\n\n".to_string());

        let (_, updates, finished) =
            run(StreamAccumulator::default(), ChunkedResponse::ok(body)).await;

        assert_eq!(updates.len(), 4);
        for pair in updates.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
            assert!(pair[1].len() > pair[0].len());
        }
        assert_eq!(updates.last(), finished.as_ref());
        assert_eq!(finished.as_deref(), Some(fragments.concat().as_str()));
    }

    #[tokio::test]
    async fn test_done_marker_produces_nothing() {
        let response = ChunkedResponse::ok(["data: [DONE]\n\n"]);
        let (result, updates, finished) = run(StreamAccumulator::default(), response).await;
        assert!(result.is_ok());
        assert!(updates.is_empty());
        assert_eq!(finished.as_deref(), Some(""));
        assert!(matches!(extract_delta("data: [DONE]"), Ok(None)));
    }

    #[tokio::test]
    async fn test_events_after_done_are_still_read() {
        let body = format!("{}data: [DONE]\n\n{}", event("a"), event("b"));
        let (_, _, finished) =
            run(StreamAccumulator::default(), ChunkedResponse::ok([body])).await;
        assert_eq!(finished.as_deref(), Some("ab"));
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped() {
        let body = format!(
            "{}data: {{not json\n\ndata: {{\"choices\":\"oops\"}}\n\n{}",
            event("one"),
            event(" two")
        );
        let (result, updates, finished) =
            run(StreamAccumulator::default(), ChunkedResponse::ok([body])).await;

        assert!(result.is_ok());
        assert_eq!(updates, vec!["one", "one two"]);
        assert_eq!(finished.as_deref(), Some("one two"));
        assert!(matches!(
            extract_delta("data: {not json"),
            Err(ClientError::MalformedEvent { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_data_lines_are_ignored() {
        let body = format!(
            ": keep-alive\nevent: message\nid: 7\n\n   \n{}",
            event("x")
        );
        let (_, updates, _) =
            run(StreamAccumulator::default(), ChunkedResponse::ok([body])).await;
        assert_eq!(updates, vec!["x"]);
    }

    #[tokio::test]
    async fn test_unsuccessful_status_rejects_before_callbacks() {
        let response = ChunkedResponse::with_status(StatusCode::INTERNAL_SERVER_ERROR);
        let (result, updates, finished) = run(StreamAccumulator::default(), response).await;
        assert!(matches!(
            result,
            Err(ClientError::Response(StatusCode::INTERNAL_SERVER_ERROR))
        ));
        assert!(updates.is_empty());
        assert!(finished.is_none());
    }

    #[tokio::test]
    async fn test_missing_body_is_unreadable() {
        let (result, updates, finished) =
            run(StreamAccumulator::default(), ChunkedResponse::without_body()).await;
        assert!(matches!(result, Err(ClientError::UnreadableStream)));
        assert!(updates.is_empty());
        assert!(finished.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_skips_finish() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(event("partial"))),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
            Ok(Bytes::from(event(" never"))),
        ];
        let response = ChunkedResponse::from_stream(StatusCode::OK, stream::iter(chunks).boxed());

        let (result, updates, finished) = run(StreamAccumulator::default(), response).await;
        assert!(matches!(result, Err(ClientError::StreamRead(_))));
        assert_eq!(updates, vec!["partial"]);
        assert!(finished.is_none());
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        let body = event("naïve ✓");
        let bytes = body.as_bytes();
        let cut = body.find('✓').unwrap() + 1;
        let response = ChunkedResponse::ok([
            Bytes::copy_from_slice(&bytes[..cut]),
            Bytes::copy_from_slice(&bytes[cut..]),
        ]);

        let (_, _, finished) = run(StreamAccumulator::default(), response).await;
        assert_eq!(finished.as_deref(), Some("naïve ✓"));
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let body = format!("{}{}", event("Hello"), event(", world"));
        let cut = body.find(", world").unwrap();
        let chunks = [body[..cut].to_string(), body[cut..].to_string()];

        let (_, _, buffered) = run(
            StreamAccumulator::new(LineSplitting::Buffered),
            ChunkedResponse::ok(chunks.clone()),
        )
        .await;
        assert_eq!(buffered.as_deref(), Some("Hello, world"));

        let (result, _, chunk_local) = run(
            StreamAccumulator::new(LineSplitting::ChunkLocal),
            ChunkedResponse::ok(chunks),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(chunk_local.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_unterminated_last_event_is_flushed() {
        let body = event("done").trim_end().to_string();
        let (_, _, finished) =
            run(StreamAccumulator::default(), ChunkedResponse::ok([body])).await;
        assert_eq!(finished.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_accumulator_is_reusable() {
        let accumulator = StreamAccumulator::default();
        let (_, _, first) = run(accumulator, ChunkedResponse::ok([event("first")])).await;
        let (_, _, second) = run(accumulator, ChunkedResponse::ok([event("second")])).await;
        assert_eq!(first.as_deref(), Some("first"));
        assert_eq!(second.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_spawned_stream_delivers_finish() {
        let finished = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&finished);

        let handle = StreamAccumulator::default().spawn(
            ChunkedResponse::ok([event("async"), event(" task")]),
            |_| {},
            move |text| *sink.lock().unwrap() = Some(text.to_string()),
        );

        handle.await.unwrap().unwrap();
        assert_eq!(finished.lock().unwrap().as_deref(), Some("async task"));
    }

    #[tokio::test]
    async fn test_aborted_stream_never_finishes() {
        let finished = Arc::new(Mutex::new(false));
        let sink = Arc::clone(&finished);
        let body = stream::iter(vec![Ok(Bytes::from(event("a")))])
            .chain(stream::pending())
            .boxed();

        let handle = StreamAccumulator::default().spawn(
            ChunkedResponse::from_stream(StatusCode::OK, body),
            |_| {},
            move |_| *sink.lock().unwrap() = true,
        );
        handle.abort();

        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!*finished.lock().unwrap());
    }
}
