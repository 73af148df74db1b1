//! Options for the completion endpoint, its transport, and chat sessions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful homework assistant. Help the student \
understand their assignments and provide guidance. Keep responses concise, under 200 words.";
pub const DEFAULT_WELCOME_MESSAGE: &str = "How can I help with your tasks today?";
pub const DEFAULT_FAILURE_MESSAGE: &str =
    "Sorry, I had trouble connecting to ChatGPT. Please try again later.";
pub const DEFAULT_IMAGE_NOTICE: &str = "I see you've uploaded an image, but our current ChatGPT \
integration doesn't support image analysis. Can I help you with something else?";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Sampling parameters added to every request a client sends.
///
/// Fields left as `None` are omitted from the request body, so the endpoint's
/// own defaults apply.
///
/// # Example
/// ```rust
/// use studychat::options::ModelOptions;
///
/// let options = ModelOptions::default()
///     .with_model("gpt-4o".to_string())
///     .with_temperature(0.7);
/// assert_eq!(options.max_tokens, None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelOptions {
    /// Model identifier (e.g., "gpt-4o")
    pub model: Option<String>,

    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,

    /// Top-p (nucleus) sampling parameter
    pub top_p: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl ModelOptions {
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Transport options: a generic timeout plus transport-specific settings.
///
/// # Example
/// ```rust
/// use studychat::options::{HttpTransport, TransportOptions};
/// use std::time::Duration;
///
/// let options = TransportOptions::new(
///     HttpTransport::default()
///         .with_base_url("http://localhost:3000".to_string())
///         .with_path("/integrations/chat-gpt/conversationgpt4".to_string()),
/// )
/// .with_timeout(Duration::from_secs(30));
/// assert_eq!(
///     options.provider.endpoint_url(),
///     "http://localhost:3000/integrations/chat-gpt/conversationgpt4"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions<T> {
    /// Request timeout, covering the whole streamed response
    pub timeout: Option<Duration>,

    pub provider: T,
}

impl<T> TransportOptions<T> {
    pub fn new(provider: T) -> Self {
        Self {
            timeout: None,
            provider,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Where and how to reach a completion endpoint over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    /// Sent as a bearer token when present
    pub api_key: Option<SecretString>,

    /// Scheme and host, defaults to `https://api.openai.com`
    pub base_url: Option<String>,

    /// Endpoint path, defaults to `/v1/chat/completions`
    pub path: Option<String>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    pub extra_headers: Option<HashMap<String, String>>,
}

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_PATH: &str = "/v1/chat/completions";

impl HttpTransport {
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Read settings from `STUDYCHAT_API_KEY`, `STUDYCHAT_BASE_URL`,
    /// `STUDYCHAT_PATH` and `STUDYCHAT_PROXY`. Unset or empty variables are
    /// left as `None`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            api_key: var("STUDYCHAT_API_KEY").map(SecretString::new),
            base_url: var("STUDYCHAT_BASE_URL"),
            path: var("STUDYCHAT_PATH"),
            proxy: var("STUDYCHAT_PROXY"),
            extra_headers: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_path(mut self, path: String) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Full URL requests are posted to.
    pub fn endpoint_url(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let path = self.path.as_deref().unwrap_or(DEFAULT_PATH);
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Texts a [`Conversation`](crate::session::Conversation) uses besides the
/// model's replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Sent as the first message of every request
    pub system_prompt: String,

    /// Assistant greeting the history starts with
    pub welcome_message: String,

    /// Assistant message appended when a reply fails
    pub failure_message: String,

    /// Prompt sent in place of an uploaded image
    pub image_notice: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            image_notice: DEFAULT_IMAGE_NOTICE.to_string(),
        }
    }
}

impl SessionOptions {
    pub fn with_system_prompt(mut self, system_prompt: String) -> Self {
        self.system_prompt = system_prompt;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let transport = HttpTransport::new("sk-123");
        let debug = format!("{:?}", transport);
        assert!(!debug.contains("sk-123"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_endpoint_url_defaults() {
        assert_eq!(
            HttpTransport::default().endpoint_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_endpoint_url_joins_slashes() {
        let transport = HttpTransport::default()
            .with_base_url("http://127.0.0.1:8080/".to_string())
            .with_path("chat".to_string());
        assert_eq!(transport.endpoint_url(), "http://127.0.0.1:8080/chat");
    }

    #[test]
    fn test_session_defaults() {
        let options = SessionOptions::default();
        assert!(options.system_prompt.starts_with("You are a helpful homework assistant."));
        assert!(options.system_prompt.ends_with("under 200 words."));
        assert_eq!(options.welcome_message, DEFAULT_WELCOME_MESSAGE);
    }
}
