//! `wela chat` — Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use wela_agent::{TurnEvent, TurnLoop, TurnOutcome};
use wela_config::AppConfig;
use wela_core::message::{Conversation, Message};
use wela_core::tool::TracingHooks;

const QUIT_TOOL: &str = "quit";

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        if config.base_url.contains("api.openai.com") {
            eprintln!();
            eprintln!("  ERROR: No API key configured!");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    WELA_API_KEY=sk-...");
            eprintln!("    OPENAI_API_KEY=sk-...");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            return Err("No API key found. See above for setup instructions.".into());
        }
        tracing::warn!(base_url = %config.base_url, "No API key configured, sending requests without one");
    }

    let turn = build_turn(&config);
    let mut history = Conversation::new();
    if let Some(prompt) = &config.agent.system_prompt {
        history.push(Message::system(prompt));
    }

    match message {
        Some(msg) => {
            history.push(Message::user(msg));
            let reply = respond(&turn, history, &mut std::io::stdout()).await?;
            report_truncation(&reply.outcome);
        }
        None => interactive(&turn, history, &config).await?,
    }
    Ok(())
}

fn build_turn(config: &AppConfig) -> TurnLoop {
    let client = wela_providers::build_client(config);
    let tools =
        wela_tools::default_registry(&config.tools, &client).with_hooks(Arc::new(TracingHooks));
    TurnLoop::new(client)
        .with_tools(Arc::new(tools))
        .configured(&config.agent)
}

async fn interactive(
    turn: &TurnLoop,
    mut history: Conversation,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  Wela — Interactive Mode");
    println!();
    println!("  Model:      {}", config.model);
    println!("  Endpoint:   {}", config.base_url);
    println!("  Streaming:  {}", if config.stream { "on" } else { "off" });
    println!("  Tools:      {}", turn.tools().names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("  You > ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" {
            break;
        }

        history.push(Message::user(input));
        print!("  Assistant > ");
        stdout.flush()?;

        let reply = respond(turn, history, &mut stdout).await?;
        println!();
        report_truncation(&reply.outcome);

        history = carry_over(reply.outcome);
        if reply.quit_requested {
            break;
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// A finished turn plus what the front end noticed along the way.
#[derive(Debug)]
pub struct Reply {
    pub outcome: TurnOutcome,
    pub quit_requested: bool,
}

/// Run one turn, writing the answer to `out` as it streams in.
///
/// Text streamed before a tool call stays on screen; the final answer is
/// printed whole when it was not streamed.
pub async fn respond<W: Write>(
    turn: &TurnLoop,
    conversation: Conversation,
    out: &mut W,
) -> std::io::Result<Reply> {
    let mut events = turn.run_stream(conversation);
    let mut streamed = false;
    let mut quit_requested = false;

    while let Some(event) = events.next().await {
        match event {
            TurnEvent::Partial { choice: 0, delta, .. } => {
                write!(out, "{delta}")?;
                out.flush()?;
                streamed = true;
            }
            TurnEvent::Partial { .. } | TurnEvent::ToolResult { .. } => {}
            TurnEvent::ToolCall { name, .. } => {
                if streamed {
                    writeln!(out)?;
                    streamed = false;
                }
                quit_requested |= name == QUIT_TOOL;
            }
            TurnEvent::Finished(outcome) => {
                if streamed {
                    writeln!(out)?;
                } else {
                    writeln!(out, "{}", outcome.message.text())?;
                }
                return Ok(Reply {
                    outcome,
                    quit_requested,
                });
            }
        }
    }
    Err(std::io::Error::other("turn ended without an outcome"))
}

/// The history the next turn starts from. Tool calls left pending by a
/// truncated turn have no results to follow them, so they are dropped and
/// only the text is kept.
fn carry_over(outcome: TurnOutcome) -> Conversation {
    let mut history = outcome.conversation;
    let mut message = outcome.message;
    if outcome.truncated {
        message.tool_calls.clear();
    }
    history.push(message);
    history
}

fn report_truncation(outcome: &TurnOutcome) {
    if outcome.truncated {
        eprintln!(
            "  [Truncated] stopped after {} model calls with {} tool call(s) still pending",
            outcome.iterations,
            outcome.message.tool_calls.len()
        );
    }
}
