//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing
//! `/chat/completions` with function calling.
//!
//! Implements both provider variants:
//! - [`CompletionProvider`]: one request, every choice mapped to a message
//! - [`StreamingProvider`]: SSE chunks mapped to fragment batches, one slot
//!   per requested completion

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};
use wela_core::error::ProviderError;
use wela_core::fragment::{FragmentBatch, PartialFragment};
use wela_core::message::Message;
use wela_core::provider::*;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    sampling: SamplingParams,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            sampling: SamplingParams::default(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body<'a>(&'a self, request: &'a ProviderRequest, stream: bool) -> ChatRequestBody<'a> {
        ChatRequestBody {
            model: &self.model,
            stream,
            sampling: &self.sampling,
            request,
        }
    }

    async fn send(
        &self,
        body: &ChatRequestBody<'_>,
        accept: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            provider = %self.name,
            model = %self.model,
            stream = body.stream,
            tools = body.request.tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", accept)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<Vec<Message>, ProviderError> {
        let body = self.body(&request, false);
        let response = self.send(&body, "application/json").await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let mut choices = api_response.choices;
        choices.sort_by_key(|c| c.index);
        Ok(choices.into_iter().map(|c| c.message).collect())
    }
}

#[async_trait]
impl StreamingProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<RawFragmentStream, ProviderError> {
        let slots = request.completions();
        let body = self.body(&request, true);
        let response = self.send(&body, "text/event-stream").await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in lines.feed(&bytes) {
                    match parse_sse_line(&line, slots) {
                        SseLine::Skip => {}
                        SseLine::Done => return,
                        SseLine::Batch(batch) => {
                            if tx.send(Ok(batch)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseLine::Unparseable(error) => {
                            trace!(
                                provider = %provider_name,
                                line = %line,
                                error = %error,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }
            // Stream ended without [DONE]; dropping `tx` ends the receiver.
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Splits a byte stream into lines. Bytes are only decoded once a whole
/// line has arrived, so a multi-byte character split across network chunks
/// stays intact.
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        let mut start = 0;
        for (i, byte) in self.pending.iter().enumerate() {
            if *byte == b'\n' {
                let line = String::from_utf8_lossy(&self.pending[start..i]);
                lines.push(line.trim_end_matches('\r').to_string());
                start = i + 1;
            }
        }
        self.pending.drain(..start);
        lines
    }
}

/// What one SSE line means for the fragment stream.
#[derive(Debug)]
enum SseLine {
    Skip,
    Done,
    Batch(FragmentBatch),
    Unparseable(String),
}

fn parse_sse_line(line: &str, slots: usize) -> SseLine {
    // Skip empty lines, SSE comments and non-data fields
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    // "[DONE]" signals end of stream
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(chunk) => match chunk_to_batch(chunk, slots) {
            Some(batch) => SseLine::Batch(batch),
            None => SseLine::Skip,
        },
        Err(e) => SseLine::Unparseable(e.to_string()),
    }
}

/// Demultiplex a chunk's choices into completion slots. Choices that carry
/// a `finish_reason` close their completion and add nothing.
fn chunk_to_batch(chunk: StreamResponse, slots: usize) -> Option<FragmentBatch> {
    let mut batch: FragmentBatch = vec![None; slots];
    let mut any = false;
    for choice in chunk.choices {
        if choice.finish_reason.is_some() || choice.index >= slots {
            continue;
        }
        batch[choice.index] = Some(choice.delta);
        any = true;
    }
    any.then_some(batch)
}

// --- OpenAI API types (internal) ---

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    stream: bool,
    #[serde(flatten)]
    sampling: &'a SamplingParams,
    #[serde(flatten)]
    request: &'a ProviderRequest,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: usize,
    message: Message,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    delta: PartialFragment,
    #[serde(default)]
    finish_reason: Option<String>,
}
