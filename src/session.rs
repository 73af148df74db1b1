//! Chat history and one-reply-at-a-time conversation flow.

use nonempty::NonEmpty;
use tracing::{debug, warn};

use crate::client::{ChatBackend, ClientError};
use crate::model::{ChatMessage, ChatRequest, Role, Sender, WireMessage};
use crate::options::SessionOptions;
use crate::stream::StreamAccumulator;

const WELCOME_ID: &str = "welcome";

/// A chat panel conversation.
///
/// Each turn sends the system prompt and the full history to a
/// [`ChatBackend`] and appends the streamed reply once it is complete.
/// Turns take `&mut self`, so a conversation never has two replies streaming
/// at once.
#[derive(Debug, Clone)]
pub struct Conversation {
    options: SessionOptions,
    accumulator: StreamAccumulator,
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl Conversation {
    /// Start a conversation holding only the assistant's greeting.
    pub fn new(options: SessionOptions) -> Self {
        let welcome = ChatMessage::with_id(WELCOME_ID, Sender::Assistant, &options.welcome_message);
        Self {
            options,
            accumulator: StreamAccumulator::default(),
            messages: vec![welcome],
        }
    }

    /// Use a differently configured accumulator for replies.
    pub fn with_accumulator(mut self, accumulator: StreamAccumulator) -> Self {
        self.accumulator = accumulator;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The request for `prompt`: system prompt, the history so far, then
    /// `prompt` as a user message.
    pub fn request_for(&self, prompt: &str) -> ChatRequest {
        let mut messages = NonEmpty::new(WireMessage::new(Role::System, &self.options.system_prompt));
        messages.extend(self.messages.iter().map(WireMessage::from));
        messages.push(WireMessage::new(Role::User, prompt));
        ChatRequest::new(messages)
    }

    /// Send a user message and stream the reply.
    ///
    /// `on_update` sees the partial reply as it grows. Returns the appended
    /// assistant message, or `None` without sending anything when `text` is
    /// blank.
    ///
    /// On error the failure notice is appended to the history in place of a
    /// reply, and the error is returned.
    pub async fn send<B, U>(
        &mut self,
        backend: &B,
        text: &str,
        on_update: U,
    ) -> Result<Option<&ChatMessage>, ClientError>
    where
        B: ChatBackend,
        U: FnMut(&str) + Send,
    {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let request = self.request_for(text);
        self.push(ChatMessage::new(Sender::User, text));
        self.respond(backend, request, on_update).await.map(Some)
    }

    /// Add an uploaded image to the history.
    ///
    /// Images are not forwarded to the backend; it is asked to relay the
    /// configured notice instead, and that reply is streamed as usual.
    pub async fn attach_image<B, U>(
        &mut self,
        backend: &B,
        data_url: &str,
        on_update: U,
    ) -> Result<&ChatMessage, ClientError>
    where
        B: ChatBackend,
        U: FnMut(&str) + Send,
    {
        let request = self.request_for(&self.options.image_notice);
        self.push(ChatMessage::image(data_url));
        self.respond(backend, request, on_update).await
    }

    async fn respond<B, U>(
        &mut self,
        backend: &B,
        request: ChatRequest,
        on_update: U,
    ) -> Result<&ChatMessage, ClientError>
    where
        B: ChatBackend,
        U: FnMut(&str) + Send,
    {
        let mut reply = None;
        let result = match backend.open_stream(request).await {
            Ok(response) => {
                self.accumulator
                    .consume(response, on_update, |text| reply = Some(text.to_string()))
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                let reply = reply.unwrap_or_default();
                debug!(chars = reply.chars().count(), "reply complete");
                Ok(self.push(ChatMessage::new(Sender::Assistant, reply)))
            }
            Err(e) => {
                warn!(error = %e, "reply failed");
                let notice = ChatMessage::new(Sender::Assistant, &self.options.failure_message);
                self.push(notice);
                Err(e)
            }
        }
    }

    fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::OfflineAssistant;
    use crate::providers::offline::canned_reply;
    use crate::stream::ChunkedResponse;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// Replies with fixed chunks and remembers the last request.
    struct ScriptedBackend {
        status: StatusCode,
        chunks: Vec<&'static str>,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(status: StatusCode, chunks: Vec<&'static str>) -> Self {
            Self {
                status,
                chunks,
                last_request: Mutex::new(None),
            }
        }

        fn last_request(&self) -> ChatRequest {
            self.last_request.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        type Response = ChunkedResponse;

        async fn open_stream(&self, request: ChatRequest) -> Result<Self::Response, ClientError> {
            *self.last_request.lock().unwrap() = Some(request);
            if self.status.is_success() {
                Ok(ChunkedResponse::ok(self.chunks.clone()))
            } else {
                Ok(ChunkedResponse::with_status(self.status))
            }
        }
    }

    #[test]
    fn test_starts_with_welcome() {
        let conversation = Conversation::default();
        let messages = conversation.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "welcome");
        assert_eq!(messages[0].sender, Sender::Assistant);
        assert_eq!(messages[0].content, "How can I help with your tasks today?");
    }

    #[tokio::test]
    async fn test_send_appends_user_and_reply() {
        let backend = ScriptedBackend::new(
            StatusCode::OK,
            vec![
                "data: {\"choices\":[{\"delta\":{\"content\":\"Start \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"early.\"}}]}\n\ndata: [DONE]\n\n",
            ],
        );
        let mut conversation = Conversation::default();
        let mut partials = Vec::new();

        let reply = conversation
            .send(&backend, "When should I start my essay?", |text| {
                partials.push(text.to_string())
            })
            .await
            .unwrap()
            .unwrap()
            .clone();

        assert_eq!(reply.content, "Start early.");
        assert_eq!(reply.sender, Sender::Assistant);
        assert_eq!(partials, vec!["Start ", "Start early."]);

        let history = conversation.messages();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].sender, Sender::User);
        assert_eq!(history[1].content, "When should I start my essay?");
        assert_eq!(history[2], reply);

        let request = backend.last_request();
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::Assistant, Role::User]);
        assert_eq!(request.messages.head.content, conversation.options().system_prompt);
        assert_eq!(request.last_user_content(), Some("When should I start my essay?"));
        assert!(request.stream);
    }

    #[tokio::test]
    async fn test_history_is_sent_on_next_turn() {
        let backend = OfflineAssistant::new();
        let mut conversation = Conversation::default();

        conversation.send(&backend, "hello", |_| {}).await.unwrap();
        let request = conversation.request_for("math question");

        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents.len(), 5);
        assert_eq!(contents[2], "hello");
        assert_eq!(contents[3], canned_reply("hello"));
        assert_eq!(contents[4], "math question");
    }

    #[tokio::test]
    async fn test_blank_message_is_ignored() {
        let backend = ScriptedBackend::new(StatusCode::OK, vec![]);
        let mut conversation = Conversation::default();

        let sent = conversation.send(&backend, "   \n", |_| {}).await.unwrap();
        assert!(sent.is_none());
        assert_eq!(conversation.messages().len(), 1);
        assert!(backend.last_request.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_reply_appends_notice() {
        let backend = ScriptedBackend::new(StatusCode::BAD_GATEWAY, vec![]);
        let mut conversation = Conversation::default();
        let mut updates = 0;

        let err = conversation
            .send(&backend, "hi", |_| updates += 1)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Response(StatusCode::BAD_GATEWAY)));
        assert_eq!(updates, 0);
        let last = conversation.messages().last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.content, conversation.options().failure_message);
    }

    #[tokio::test]
    async fn test_attach_image_relays_notice() {
        let backend = ScriptedBackend::new(
            StatusCode::OK,
            vec!["data: {\"choices\":[{\"delta\":{\"content\":\"No images, sorry.\"}}]}\n\n"],
        );
        let mut conversation = Conversation::default();

        let reply = conversation
            .attach_image(&backend, "data:image/png;base64,iVBORw0KGgo=", |_| {})
            .await
            .unwrap()
            .content
            .clone();

        assert_eq!(reply, "No images, sorry.");
        let history = conversation.messages();
        assert!(history[1].is_image);
        assert_eq!(history[1].content, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(
            backend.last_request().last_user_content(),
            Some(conversation.options().image_notice.as_str())
        );
    }
}
