//! Shared test helpers for turn loop and agent tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use wela_core::error::ToolError;
use wela_core::message::{Message, MessageToolCall};
use wela_core::provider::ModelClient;
use wela_core::tool::{Tool, ToolParameters};
use wela_providers::{ScriptedProvider, ScriptedReply};

/// A batch client replaying `replies`, plus a handle for inspecting calls.
pub fn scripted(
    replies: impl IntoIterator<Item = ScriptedReply>,
) -> (ModelClient, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::new(replies));
    (ModelClient::Complete(provider.clone()), provider)
}

/// Same as [`scripted`], but the client streams fragment batches.
pub fn streaming(
    replies: impl IntoIterator<Item = ScriptedReply>,
) -> (ModelClient, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::new(replies));
    (ModelClient::Streaming(provider.clone()), provider)
}

/// An assistant message requesting a single tool call.
pub fn tool_call_message(id: &str, name: &str, arguments: &str) -> Message {
    Message::tool_request(vec![MessageToolCall::function(id, name, arguments)])
}

/// Returns its `text` argument unchanged.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the input"
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::object()
            .property("text", "string", "Text to echo")
            .require("text")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        Ok(arguments
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}
