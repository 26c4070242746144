//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools return plain text. Anything structured is serialized by the tool
//! before it returns.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

pub const INVALID_ARGUMENTS: &str = "Error: Invalid JSON format for arguments.";

/// The `parameters` object of a tool schema:
/// `{type: "object", properties: {...}, required: [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    pub kind: String,

    pub properties: Map<String, Value>,

    pub required: Vec<String>,
}

impl ToolParameters {
    /// An object schema with no properties yet.
    pub fn object() -> Self {
        Self {
            kind: "object".into(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    /// Add a `{type, description}` property.
    pub fn property(self, name: &str, kind: &str, description: &str) -> Self {
        self.property_schema(
            name,
            serde_json::json!({ "type": kind, "description": description }),
        )
    }

    /// Add a property with an arbitrary JSON schema.
    pub fn property_schema(mut self, name: &str, schema: Value) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    pub fn require(mut self, name: &str) -> Self {
        self.required.push(name.to_string());
        self
    }
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self::object()
    }
}

/// The core Tool trait.
///
/// Each tool is registered in the [`ToolRegistry`] and offered to the model
/// through its [`ToolDefinition`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_weather_forecast").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    fn parameters(&self) -> ToolParameters;

    /// Execute the tool with the parsed argument object.
    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters())
    }
}

/// What a hook sees around a dispatch. `result` is only set after the call.
#[derive(Debug, Clone)]
pub struct ToolEvent<'a> {
    pub tool_name: &'a str,
    pub arguments: &'a Map<String, Value>,
    pub result: Option<&'a str>,
}

/// Observability hooks around a successful dispatch. They cannot change
/// the outcome.
pub trait ToolHooks: Send + Sync {
    fn before_tool_call(&self, _event: &ToolEvent<'_>) {}

    fn after_tool_call(&self, _event: &ToolEvent<'_>) {}
}

/// Hooks that log every dispatch through `tracing`.
pub struct TracingHooks;

impl ToolHooks for TracingHooks {
    fn before_tool_call(&self, event: &ToolEvent<'_>) {
        let arguments = Value::Object(event.arguments.clone());
        info!(tool = event.tool_name, %arguments, "Calling tool");
    }

    fn after_tool_call(&self, event: &ToolEvent<'_>) {
        info!(
            tool = event.tool_name,
            output_len = event.result.map_or(0, str::len),
            "Tool finished"
        );
    }
}

/// An ordered registry of available tools.
///
/// The turn loop uses it to:
/// 1. Get tool definitions to send to the LLM (registration order)
/// 2. Dispatch a requested call and get text back
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    hooks: Option<Arc<dyn ToolHooks>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.position(tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Box::new(tool));
        self
    }

    pub fn set_hooks(&mut self, hooks: Arc<dyn ToolHooks>) {
        self.hooks = Some(hooks);
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolHooks>) -> Self {
        self.set_hooks(hooks);
        self
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tools.iter().position(|t| t.name() == name)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.position(name).map(|i| self.tools[i].as_ref())
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch one tool call. Every failure is rendered as text.
    pub async fn run(&self, call: &MessageToolCall) -> String {
        let parsed: Value = match serde_json::from_str(&call.arguments) {
            Ok(v) => v,
            Err(e) => {
                debug!(tool = %call.name, error = %e, "Tool arguments are not valid JSON");
                return INVALID_ARGUMENTS.to_string();
            }
        };

        let Some(tool) = self.get(&call.name) else {
            return format!("Error: Tool '{}' not found.", call.name);
        };

        let arguments = match parsed {
            Value::Object(map) => map,
            other => {
                let err = ToolError::InvalidArguments(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                ));
                return execution_error(&err);
            }
        };

        if let Some(hooks) = &self.hooks {
            hooks.before_tool_call(&ToolEvent {
                tool_name: &call.name,
                arguments: &arguments,
                result: None,
            });
        }

        let output = match tool.execute(arguments.clone()).await {
            Ok(output) => output,
            Err(e) => return execution_error(&e),
        };

        if let Some(hooks) = &self.hooks {
            hooks.after_tool_call(&ToolEvent {
                tool_name: &call.name,
                arguments: &arguments,
                result: Some(&output),
            });
        }

        output
    }
}

fn execution_error(err: &ToolError) -> String {
    format!("Error: An error occurred while running the tool - {err}")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A simple test tool for unit tests.
    struct EchoTool;

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

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> ToolParameters {
            ToolParameters::object()
        }
        async fn execute(&self, _arguments: Map<String, Value>) -> Result<String, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "disk on fire".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        seen: Mutex<Vec<String>>,
    }

    impl ToolHooks for RecordingHooks {
        fn before_tool_call(&self, event: &ToolEvent<'_>) {
            self.seen.lock().unwrap().push(format!("before:{}", event.tool_name));
        }
        fn after_tool_call(&self, event: &ToolEvent<'_>) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("after:{}={}", event.tool_name, event.result.unwrap_or("")));
        }
    }

    fn call(name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall::function("call_1", name, arguments)
    }

    #[test]
    fn definitions_keep_registration_order() {
        let registry = ToolRegistry::new().with_tool(EchoTool).with_tool(BrokenTool);
        let names: Vec<String> = registry
            .definitions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["echo", "broken"]);
        assert_eq!(registry.definitions()[0].function.parameters.required, vec!["text"]);
    }

    #[test]
    fn reregistering_replaces_in_place() {
        let mut registry = ToolRegistry::new().with_tool(EchoTool).with_tool(BrokenTool);
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.names(), vec!["echo", "broken"]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn run_dispatches_to_tool() {
        let registry = ToolRegistry::new().with_tool(EchoTool);
        let out = registry.run(&call("echo", r#"{"text":"hello world"}"#)).await;
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn run_missing_tool_returns_text() {
        let registry = ToolRegistry::new().with_tool(EchoTool);
        let out = registry.run(&call("missing", "{}")).await;
        assert_eq!(out, "Error: Tool 'missing' not found.");
    }

    #[tokio::test]
    async fn run_invalid_json_returns_text() {
        let registry = ToolRegistry::new().with_tool(EchoTool);
        let out = registry.run(&call("echo", "not-json")).await;
        assert_eq!(out, "Error: Invalid JSON format for arguments.");
    }

    #[tokio::test]
    async fn invalid_json_is_checked_before_name() {
        let registry = ToolRegistry::new();
        let out = registry.run(&call("missing", "{")).await;
        assert_eq!(out, INVALID_ARGUMENTS);
    }

    #[tokio::test]
    async fn run_tool_failure_returns_text() {
        let registry = ToolRegistry::new().with_tool(BrokenTool);
        let out = registry.run(&call("broken", "{}")).await;
        assert_eq!(
            out,
            "Error: An error occurred while running the tool - broken failed: disk on fire"
        );
    }

    #[tokio::test]
    async fn non_object_arguments_are_an_execution_error() {
        let registry = ToolRegistry::new().with_tool(EchoTool);
        let out = registry.run(&call("echo", "[1,2]")).await;
        assert!(out.starts_with("Error: An error occurred while running the tool - "));
        assert!(out.contains("an array"));
    }

    #[tokio::test]
    async fn hooks_wrap_successful_dispatch_only() {
        let hooks = Arc::new(RecordingHooks::default());
        let registry = ToolRegistry::new()
            .with_tool(EchoTool)
            .with_tool(BrokenTool)
            .with_hooks(hooks.clone());

        registry.run(&call("echo", r#"{"text":"hi"}"#)).await;
        registry.run(&call("broken", "{}")).await;
        registry.run(&call("missing", "{}")).await;

        let seen = hooks.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["before:echo", "after:echo=hi", "before:broken"]);
    }

    #[tokio::test]
    async fn tracing_hooks_leave_output_unchanged() {
        let registry = ToolRegistry::new()
            .with_tool(EchoTool)
            .with_hooks(Arc::new(TracingHooks));
        let out = registry.run(&call("echo", r#"{"text":"logged"}"#)).await;
        assert_eq!(out, "logged");
    }
}
