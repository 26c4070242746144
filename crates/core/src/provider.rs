//! Provider traits — the abstraction over chat-completion backends.
//!
//! A backend is either a [`CompletionProvider`] (one complete message per
//! requested completion) or a [`StreamingProvider`] (a lazy sequence of
//! fragment batches). Which one a turn talks to is fixed when the
//! [`ModelClient`] is built from configuration, never decided per call.
//!
//! `ModelClient` is also the failure boundary: provider errors come back
//! as synthetic assistant messages so the turn loop always has something
//! to look at.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProviderError;
use crate::fragment::{FragmentBatch, PartialFragment};
use crate::message::{Message, Role};
use crate::param::{Param, StopSequences};
use crate::tool::ToolParameters;

/// Per-call options for a chat completion.
///
/// The model name and sampling knobs belong to the provider, set once at
/// configuration time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The conversation messages
    pub messages: Vec<Message>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Param::is_omitted")]
    pub max_tokens: Param<u32>,

    /// Number of completions to generate
    #[serde(default, skip_serializing_if = "Param::is_omitted")]
    pub n: Param<u32>,

    /// Stop sequence(s)
    #[serde(default, skip_serializing_if = "Param::is_omitted")]
    pub stop: Param<StopSequences>,

    /// Tools the model may call; empty means tools are not offered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ProviderRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// How many completion slots every response or fragment batch carries.
    pub fn completions(&self) -> usize {
        self.n.value().map_or(1, |n| (*n).max(1) as usize)
    }
}

/// Sampling knobs sent with every request of a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Param::is_omitted")]
    pub temperature: Param<f32>,

    #[serde(default, skip_serializing_if = "Param::is_omitted")]
    pub top_p: Param<f32>,

    #[serde(default, skip_serializing_if = "Param::is_omitted")]
    pub frequency_penalty: Param<f32>,

    #[serde(default, skip_serializing_if = "Param::is_omitted")]
    pub presence_penalty: Param<f32>,
}

/// A tool definition in the shape offered to the model:
/// `{type: "function", function: {name, description, parameters}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,

    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
    ) -> Self {
        Self {
            kind: crate::message::FUNCTION_KIND.into(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Fragment batches as produced by a streaming provider.
pub type RawFragmentStream = BoxStream<'static, Result<FragmentBatch, ProviderError>>;

/// Fragment batches after the client boundary; errors already rendered.
pub type FragmentStream = BoxStream<'static, FragmentBatch>;

/// A backend that answers with complete messages.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// One message per requested completion, in completion-index order.
    async fn complete(&self, request: ProviderRequest) -> Result<Vec<Message>, ProviderError>;
}

/// A backend that answers with incremental fragments.
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Start a streamed completion. The stream ends when the provider
    /// signals completion; dropping it abandons the response.
    async fn stream(&self, request: ProviderRequest) -> Result<RawFragmentStream, ProviderError>;
}

/// What one model call produced.
pub enum Prediction {
    /// At least one candidate message
    Complete(Vec<Message>),
    Stream(FragmentStream),
}

impl std::fmt::Debug for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prediction::Complete(messages) => f.debug_tuple("Complete").field(messages).finish(),
            Prediction::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The language-model client a turn loop talks to.
#[derive(Clone)]
pub enum ModelClient {
    Complete(Arc<dyn CompletionProvider>),
    Streaming(Arc<dyn StreamingProvider>),
}

impl ModelClient {
    pub fn name(&self) -> &str {
        match self {
            ModelClient::Complete(p) => p.name(),
            ModelClient::Streaming(p) => p.name(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, ModelClient::Streaming(_))
    }

    /// Run one model call. Never fails: provider errors become an
    /// assistant message whose content is the error text.
    pub async fn predict(&self, request: ProviderRequest) -> Prediction {
        let slots = request.completions();
        match self {
            ModelClient::Complete(provider) => match provider.complete(request).await {
                Ok(messages) if !messages.is_empty() => Prediction::Complete(messages),
                Ok(_) => {
                    let err = ProviderError::InvalidResponse("no choices in response".into());
                    Prediction::Complete(error_messages(provider.name(), &err, slots))
                }
                Err(err) => Prediction::Complete(error_messages(provider.name(), &err, slots)),
            },
            ModelClient::Streaming(provider) => match provider.stream(request).await {
                Ok(raw) => {
                    let name = provider.name().to_string();
                    let stream = raw.scan(false, move |failed, item| {
                        let next = if *failed {
                            None
                        } else {
                            match item {
                                Ok(batch) => Some(batch),
                                Err(err) => {
                                    *failed = true;
                                    Some(error_batch(&name, &err, slots))
                                }
                            }
                        };
                        futures::future::ready(next)
                    });
                    Prediction::Stream(stream.boxed())
                }
                Err(err) => {
                    let batch = error_batch(provider.name(), &err, slots);
                    Prediction::Stream(stream::iter(vec![batch]).boxed())
                }
            },
        }
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelClient::Complete(p) => write!(f, "ModelClient::Complete({})", p.name()),
            ModelClient::Streaming(p) => write!(f, "ModelClient::Streaming({})", p.name()),
        }
    }
}

fn error_messages(provider: &str, err: &ProviderError, slots: usize) -> Vec<Message> {
    warn!(provider, error = %err, "Model call failed, answering with the error text");
    vec![Message::assistant(err.to_string()); slots]
}

fn error_batch(provider: &str, err: &ProviderError, slots: usize) -> FragmentBatch {
    warn!(provider, error = %err, "Model stream failed, answering with the error text");
    let fragment = PartialFragment {
        role: Some(Role::Assistant),
        content: Some(err.to_string()),
        tool_calls: None,
    };
    vec![Some(fragment); slots]
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<Vec<Message>, ProviderError> {
            Err(ProviderError::Network("connection reset".into()))
        }
    }

    #[async_trait]
    impl StreamingProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn stream(&self, _request: ProviderRequest) -> Result<RawFragmentStream, ProviderError> {
            let items = vec![
                Ok(vec![Some(PartialFragment::content("par"))]),
                Err(ProviderError::StreamInterrupted("eof".into())),
                Ok(vec![Some(PartialFragment::content("never seen"))]),
            ];
            Ok(stream::iter(items).boxed())
        }
    }

    #[test]
    fn request_defaults_omit_everything() {
        let req = ProviderRequest::new(vec![Message::user("hi")]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}));
        assert_eq!(req.completions(), 1);
    }

    #[test]
    fn completions_follow_n() {
        let req = ProviderRequest {
            n: Param::Value(3),
            ..ProviderRequest::default()
        };
        assert_eq!(req.completions(), 3);
    }

    #[test]
    fn tool_definition_wire_shape() {
        let params = ToolParameters::object()
            .property("command", "string", "The command to run")
            .require("command");
        let def = ToolDefinition::function("shell", "Execute a shell command", params);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": "shell",
                    "description": "Execute a shell command",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "command": {"type": "string", "description": "The command to run"}
                        },
                        "required": ["command"]
                    }
                }
            })
        );
    }

    #[tokio::test]
    async fn batch_failure_becomes_assistant_message() {
        let client = ModelClient::Complete(Arc::new(FailingProvider));
        let Prediction::Complete(messages) = client.predict(ProviderRequest::default()).await else {
            panic!("batch client must answer with complete messages");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert!(messages[0].text().contains("connection reset"));
        assert!(!messages[0].has_tool_calls());
    }

    #[tokio::test]
    async fn stream_failure_ends_with_error_fragment() {
        let client = ModelClient::Streaming(Arc::new(FailingProvider));
        let Prediction::Stream(stream) = client.predict(ProviderRequest::default()).await else {
            panic!("streaming client must answer with a stream");
        };
        let batches: Vec<FragmentBatch> = stream.collect().await;
        assert_eq!(batches.len(), 2);
        let last = batches[1][0].as_ref().unwrap();
        assert!(last.content.as_deref().unwrap().contains("eof"));
    }
}
