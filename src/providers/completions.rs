//! Chat Completions style streaming endpoint over HTTP.
//!
//! Requests are posted as `{"messages": [...], "stream": true}` and the
//! response is read as an event stream of `choices[0].delta.content`
//! fragments.

use async_trait::async_trait;
use tracing::debug;

use crate::client::{ChatBackend, ClientError};
use crate::http::{add_stream_headers, build_http_client};
use crate::model::ChatRequest;
use crate::options::{HttpTransport, ModelOptions, TransportOptions};

/// HTTP client for a streaming completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionsClient {
    model_options: ModelOptions,
    transport_options: TransportOptions<HttpTransport>,
    http: reqwest::Client,
}

impl CompletionsClient {
    /// Create a client, building the underlying HTTP client once.
    pub fn new(
        model_options: ModelOptions,
        transport_options: TransportOptions<HttpTransport>,
    ) -> Result<Self, ClientError> {
        let http = build_http_client(&transport_options)?;
        Ok(Self {
            model_options,
            transport_options,
            http,
        })
    }

    pub fn model_options(&self) -> &ModelOptions {
        &self.model_options
    }

    pub fn transport_options(&self) -> &TransportOptions<HttpTransport> {
        &self.transport_options
    }

    /// Fill request fields the caller left unset from the model options.
    fn apply_model_options(&self, mut request: ChatRequest) -> ChatRequest {
        let options = &self.model_options;
        request.model = request.model.or_else(|| options.model.clone());
        request.temperature = request.temperature.or(options.temperature);
        request.top_p = request.top_p.or(options.top_p);
        request.max_tokens = request.max_tokens.or(options.max_tokens);
        request.stream = true;
        request
    }
}

#[async_trait]
impl ChatBackend for CompletionsClient {
    type Response = reqwest::Response;

    async fn open_stream(&self, request: ChatRequest) -> Result<Self::Response, ClientError> {
        let url = self.transport_options.provider.endpoint_url();
        let request_body = self.apply_model_options(request);

        debug!(%url, messages = request_body.messages.len(), "opening completion stream");

        let req = add_stream_headers(self.http.post(&url), &self.transport_options.provider);
        let response = req.json(&request_body).send().await?;

        debug!(status = %response.status(), "completion stream opened");
        Ok(response)
    }
}
