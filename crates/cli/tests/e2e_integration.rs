//! End-to-end integration tests for the Wela agent.
//!
//! These wire configuration, the HTTP provider, the built-in tools and the
//! turn loop together against local mock servers.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use wela_agent::{ChatTemplate, SequentialAgent, Stage, TurnEvent, TurnLoop};
use wela_config::{AppConfig, ToolsConfig};
use wela_core::message::{Conversation, Message, MessageToolCall, Role};
use wela_core::provider::ModelClient;
use wela_providers::{ScriptedProvider, ScriptedReply, build_client};
use wela_tools::default_registry;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Fixtures ─────────────────────────────────────────────────────────────

fn weather_report() -> serde_json::Value {
    let desc = |s: &str| json!([{ "value": s }]);
    json!({
        "current_condition": [{
            "weatherDesc": desc("Light rain"),
            "temp_C": "12",
            "FeelsLikeC": "10",
            "winddir16Point": "SW",
            "windspeedKmph": "19"
        }],
        "nearest_area": [{
            "areaName": desc("London"),
            "region": desc("City of London, Greater London"),
            "country": desc("United Kingdom")
        }],
        "weather": []
    })
}

fn sse(chunks: &[serde_json::Value]) -> String {
    let mut body: String = chunks
        .iter()
        .map(|c| format!("data: {c}\n\n"))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn delta(delta: serde_json::Value) -> serde_json::Value {
    json!({"choices": [{"index": 0, "delta": delta, "finish_reason": null}]})
}

fn finish(reason: &str) -> serde_json::Value {
    json!({"choices": [{"index": 0, "delta": {}, "finish_reason": reason}]})
}

fn config_for(model: &MockServer, weather: &MockServer, stream: bool) -> AppConfig {
    AppConfig {
        api_key: Some("sk-test".into()),
        base_url: format!("{}/v1", model.uri()),
        stream,
        tools: ToolsConfig {
            weather_base_url: weather.uri(),
            ..ToolsConfig::default()
        },
        ..AppConfig::default()
    }
}

fn turn_for(config: &AppConfig) -> TurnLoop {
    let client = build_client(config);
    let tools = default_registry(&config.tools, &client);
    TurnLoop::new(client)
        .with_tools(Arc::new(tools))
        .configured(&config.agent)
}

fn scripted_turn(provider: Arc<ScriptedProvider>) -> TurnLoop {
    let client = ModelClient::Complete(provider);
    let tools = default_registry(&ToolsConfig::default(), &client);
    TurnLoop::new(client).with_tools(Arc::new(tools))
}

fn user(text: &str) -> Conversation {
    Conversation::from(vec![Message::user(text)])
}

// ── Batch mode over HTTP ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_batch_weather_tool_round_trip() {
    let model = MockServer::start().await;
    let weather = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/London"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_report()))
        .expect(1)
        .mount(&weather)
        .await;

    // First call: the model asks for the forecast.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_w",
                        "type": "function",
                        "function": {"name": "get_weather_forecast", "arguments": "{\"city\":\"London\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .up_to_n_times(1)
        .mount(&model)
        .await;

    // Second call: it sees the tool result and answers.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Bring an umbrella."},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&model)
        .await;

    let config = config_for(&model, &weather, false);
    let outcome = turn_for(&config).run(user("Weather in London?")).await;

    assert_eq!(outcome.message.text(), "Bring an umbrella.");
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.tool_calls_made, 1);
    assert!(!outcome.truncated);

    let tool_message = &outcome.conversation.messages()[2];
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_w"));
    assert!(tool_message.text().contains("London,City of London, Greater London,United Kingdom"));
    assert!(tool_message.text().contains("- Weather: Light rain"));
}

// ── Streaming mode over HTTP ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_streamed_tool_call_then_streamed_answer() {
    let model = MockServer::start().await;
    let weather = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/London"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_report()))
        .mount(&weather)
        .await;

    let tool_call_stream = sse(&[
        delta(json!({"role": "assistant", "content": null, "tool_calls": [
            {"index": 0, "id": "call_s", "type": "function",
             "function": {"name": "get_weather_forecast", "arguments": ""}}
        ]})),
        delta(json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"city\":"}}]})),
        delta(json!({"tool_calls": [{"index": 0, "function": {"arguments": "\"London\"}"}}]})),
        finish("tool_calls"),
    ]);
    let answer_stream = sse(&[
        delta(json!({"role": "assistant", "content": ""})),
        delta(json!({"content": "12°C and "})),
        delta(json!({"content": "raining."})),
        finish("stop"),
    ]);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(tool_call_stream),
        )
        .up_to_n_times(1)
        .mount(&model)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(answer_stream),
        )
        .mount(&model)
        .await;

    let config = config_for(&model, &weather, true);
    let turn = turn_for(&config);
    assert!(turn.client().is_streaming());

    let events: Vec<TurnEvent> = turn.run_stream(user("Weather in London?")).collect().await;

    let deltas: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Partial { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec!["12°C and ", "raining."]);

    let Some(TurnEvent::Finished(outcome)) = events.last() else {
        panic!("stream did not finish");
    };
    assert_eq!(outcome.message.text(), "12°C and raining.");
    assert_eq!(
        outcome.conversation.messages()[1].tool_calls,
        vec![MessageToolCall::function(
            "call_s",
            "get_weather_forecast",
            "{\"city\":\"London\"}"
        )]
    );
}

#[tokio::test]
async fn e2e_provider_error_becomes_answer_text() {
    let model = MockServer::start().await;
    let weather = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&model)
        .await;

    for stream in [false, true] {
        let config = config_for(&model, &weather, stream);
        let outcome = turn_for(&config).run(user("hi")).await;
        assert!(
            outcome.message.text().starts_with("Authentication failed"),
            "stream={stream}: {}",
            outcome.message.text()
        );
        assert_eq!(outcome.iterations, 1);
    }
}

// ── Scripted scenarios ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_single_iteration_returns_raw_content() {
    let provider = Arc::new(ScriptedProvider::new([ScriptedReply::message(
        Message::assistant("just text"),
    )]));
    let turn = scripted_turn(provider.clone()).with_max_iterations(1);

    let outcome = turn.run(user("hello")).await;

    assert_eq!(outcome.message.text(), "just text");
    assert_eq!(provider.call_count(), 1);
    assert!(provider.requests()[0].tools.is_empty());
}

#[tokio::test]
async fn e2e_budget_exhausted_with_pending_tool_calls() {
    let alarm = || {
        ScriptedReply::message(Message::tool_request(vec![MessageToolCall::function(
            "c",
            "set_alarm_clock",
            r#"{"date_time":"2026-10-20 07:00","reason":"gym"}"#,
        )]))
    };
    let provider = Arc::new(ScriptedProvider::new([alarm(), alarm()]));
    let turn = scripted_turn(provider.clone()).with_max_iterations(2);

    let outcome = turn.run(user("wake me")).await;

    assert!(outcome.truncated);
    assert_eq!(outcome.tool_calls_made, 1);
    assert_eq!(
        outcome.conversation.messages()[2].text(),
        "Alarm clock set successfully"
    );
    assert_eq!(provider.requests()[0].tools.len(), 4);
    assert!(provider.requests()[1].tools.is_empty());
}

#[tokio::test]
async fn e2e_malformed_arguments_are_reported_to_the_model() {
    let provider = Arc::new(ScriptedProvider::new([
        ScriptedReply::message(Message::tool_request(vec![MessageToolCall::function(
            "c",
            "quit",
            "{not json",
        )])),
        ScriptedReply::message(Message::assistant("Let me try again later.")),
    ]));
    let turn = scripted_turn(provider);

    let outcome = turn.run(user("bye")).await;

    assert_eq!(
        outcome.conversation.messages()[2].text(),
        "Error: Invalid JSON format for arguments."
    );
    assert_eq!(outcome.message.text(), "Let me try again later.");
}

#[tokio::test]
async fn e2e_sequential_stages_share_outputs() {
    let outline = Arc::new(ScriptedProvider::new([ScriptedReply::message(
        Message::assistant("1. intro 2. body"),
    )]));
    let writer = Arc::new(ScriptedProvider::new([ScriptedReply::message(
        Message::assistant("full essay"),
    )]));

    let agent = SequentialAgent::new()
        .stage(
            Stage::new(
                TurnLoop::new(ModelClient::Complete(outline)),
                ChatTemplate::new()
                    .system("You write outlines.")
                    .user("Outline an essay on {input}"),
            )
            .with_output_key("outline"),
        )
        .stage(
            Stage::new(
                TurnLoop::new(ModelClient::Complete(writer.clone())),
                ChatTemplate::new().user("Expand this outline: {outline}"),
            )
            .with_output_key("essay"),
        );

    let outcome = agent.run_input("ownership").await;

    assert_eq!(outcome.variables["essay"], "full essay");
    assert_eq!(
        writer.requests()[0].messages[0].text(),
        "Expand this outline: 1. intro 2. body"
    );
}

#[tokio::test]
async fn e2e_visit_webpage_runs_a_nested_turn() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ferris"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>Ferris is a crab.</p></body></html>"),
        )
        .mount(&site)
        .await;

    let url = format!("{}/ferris", site.uri());
    let provider = Arc::new(ScriptedProvider::new([
        ScriptedReply::message(Message::tool_request(vec![MessageToolCall::function(
            "v1",
            "visit_webpage",
            json!({"url": url, "question": "Who is Ferris?"}).to_string(),
        )])),
        ScriptedReply::message(Message::assistant("Ferris: a crab")),
        ScriptedReply::message(Message::assistant("Ferris is Rust's crab.")),
    ]));
    let client = ModelClient::Complete(provider.clone());
    let tools = default_registry(
        &ToolsConfig {
            enabled: vec!["visit_webpage".into()],
            ..ToolsConfig::default()
        },
        &client,
    );

    let outcome = TurnLoop::new(client)
        .with_tools(Arc::new(tools))
        .run(user("Who is Ferris?"))
        .await;

    assert_eq!(outcome.message.text(), "Ferris is Rust's crab.");
    assert_eq!(outcome.conversation.messages()[2].text(), "Ferris: a crab");

    let requests = provider.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].messages[0].text(), "Ferris is a crab.");
    assert!(requests[1].tools.is_empty());
}
