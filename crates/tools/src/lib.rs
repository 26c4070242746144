//! Built-in tool implementations for Wela.
//!
//! Tools give the agent a small set of capabilities: look up the weather,
//! search the web, define a word, read a webpage, plan multi-step work, set
//! an alarm, and end the chat. Network-backed tools share one HTTP client
//! that honours the configured proxy. `visit_webpage` and
//! `plan_and_execute` run nested turns against the same model as the chat.

pub mod alarm_clock;
pub mod definition;
pub mod plan_execute;
pub mod quit;
pub mod weather;
pub mod web_browser;
pub mod web_search;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;
use wela_agent::TurnLoop;
use wela_config::ToolsConfig;
use wela_core::error::ToolError;
use wela_core::provider::ModelClient;
use wela_core::tool::{Tool, ToolRegistry};

pub use alarm_clock::AlarmClockTool;
pub use definition::DefinitionTool;
pub use plan_execute::PlanAndExecuteTool;
pub use quit::QuitTool;
pub use weather::WeatherForecastTool;
pub use web_browser::WebBrowserTool;
pub use web_search::DuckDuckGoSearchTool;

/// Every built-in tool name.
pub const BUILTIN_TOOLS: [&str; 7] = [
    "get_weather_forecast",
    "duckduckgo_search",
    "get_definition",
    "visit_webpage",
    "plan_and_execute",
    "set_alarm_clock",
    "quit",
];

/// Tools the plan-and-execute executor may call while working on a step.
const EXECUTOR_TOOLS: [&str; 4] = [
    "get_weather_forecast",
    "get_definition",
    "duckduckgo_search",
    "visit_webpage",
];

/// Create a registry holding the enabled built-in tools, in the order they
/// are listed. Unknown names are skipped with a warning. `model` backs the
/// tools that run nested turns.
pub fn default_registry(config: &ToolsConfig, model: &ModelClient) -> ToolRegistry {
    let http = http_client(config.proxy.as_deref());
    let mut registry = ToolRegistry::new();

    for name in &config.enabled {
        match builtin(name, config, model, &http) {
            Some(tool) => registry.register(tool),
            None => warn!(tool = %name, "Unknown tool in config, skipping"),
        }
    }
    registry
}

fn builtin(
    name: &str,
    config: &ToolsConfig,
    model: &ModelClient,
    http: &reqwest::Client,
) -> Option<Box<dyn Tool>> {
    let tool: Box<dyn Tool> = match name {
        "get_weather_forecast" => Box::new(WeatherForecastTool::new(
            &config.weather_base_url,
            http.clone(),
        )),
        "duckduckgo_search" => Box::new(DuckDuckGoSearchTool::new(
            &config.search_base_url,
            http.clone(),
        )),
        "get_definition" => Box::new(DefinitionTool::new(
            &config.definition_base_url,
            http.clone(),
        )),
        "visit_webpage" => Box::new(WebBrowserTool::new(http.clone(), TurnLoop::new(model.clone()))),
        "plan_and_execute" => {
            let mut executor_tools = ToolRegistry::new();
            for name in EXECUTOR_TOOLS {
                if let Some(tool) = builtin(name, config, model, http) {
                    executor_tools.register(tool);
                }
            }
            Box::new(PlanAndExecuteTool::new(model.clone(), Arc::new(executor_tools)))
        }
        "set_alarm_clock" => Box::new(AlarmClockTool),
        "quit" => Box::new(QuitTool),
        _ => return None,
    };
    Some(tool)
}

/// Shared HTTP client. A proxy that fails to parse is ignored.
pub fn http_client(proxy: Option<&str>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().user_agent(concat!("wela/", env!("CARGO_PKG_VERSION")));
    if let Some(url) = proxy {
        match reqwest::Proxy::all(url) {
            Ok(p) => builder = builder.proxy(p),
            Err(e) => warn!(proxy = url, error = %e, "Invalid proxy URL, connecting directly"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build HTTP client, using defaults");
        reqwest::Client::new()
    })
}

pub(crate) fn required_str<'a>(
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wela_core::message::MessageToolCall;
    use wela_providers::ScriptedProvider;

    fn model() -> ModelClient {
        ModelClient::Complete(Arc::new(ScriptedProvider::new(Vec::new())))
    }

    fn registry(config: &ToolsConfig) -> ToolRegistry {
        default_registry(config, &model())
    }

    #[test]
    fn default_registry_follows_enabled_list() {
        let config = ToolsConfig::default();
        assert_eq!(registry(&config).names(), config.enabled);
    }

    #[test]
    fn every_builtin_can_be_enabled() {
        let config = ToolsConfig {
            enabled: BUILTIN_TOOLS.iter().map(|name| name.to_string()).collect(),
            ..ToolsConfig::default()
        };
        assert_eq!(registry(&config).names(), BUILTIN_TOOLS.to_vec());
    }

    #[test]
    fn executor_tools_are_builtins_without_planning() {
        for name in EXECUTOR_TOOLS {
            assert!(BUILTIN_TOOLS.contains(&name));
        }
        assert!(!EXECUTOR_TOOLS.contains(&"plan_and_execute"));
    }

    #[test]
    fn enabled_list_controls_membership_and_order() {
        let config = ToolsConfig {
            enabled: vec!["quit".into(), "bogus".into(), "set_alarm_clock".into()],
            ..ToolsConfig::default()
        };
        assert_eq!(registry(&config).names(), vec!["quit", "set_alarm_clock"]);
    }

    #[test]
    fn bad_proxy_still_builds_client() {
        let config = ToolsConfig {
            proxy: Some("not a url".into()),
            ..ToolsConfig::default()
        };
        assert_eq!(registry(&config).len(), 4);
    }

    #[test]
    fn definitions_serialize_to_wire_schema() {
        let json = serde_json::to_value(registry(&ToolsConfig::default()).definitions()).unwrap();
        assert_eq!(json[3]["type"], "function");
        assert_eq!(json[3]["function"]["name"], "quit");
        assert_eq!(json[3]["function"]["parameters"]["required"][0], "goodbye_words");
    }

    #[tokio::test]
    async fn missing_argument_surfaces_through_registry() {
        let out = registry(&ToolsConfig::default())
            .run(&MessageToolCall::function("c1", "quit", "{}"))
            .await;
        assert_eq!(
            out,
            "Error: An error occurred while running the tool - Invalid tool arguments: Missing 'goodbye_words' argument"
        );
    }
}
