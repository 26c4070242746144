//! Turn-level streaming events.
//!
//! `TurnEvent` wraps reassembled stream output and tool activity into events
//! a front end can render as they arrive.

use serde::Serialize;
use wela_core::message::Message;

use crate::turn_loop::TurnOutcome;

/// Events emitted by [`TurnLoop::run_stream`](crate::TurnLoop::run_stream).
///
/// A stream carries any number of `partial`, `tool_call` and `tool_result`
/// events, then exactly one `finished`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// New text for one completion, with everything accumulated so far.
    Partial {
        choice: usize,
        delta: String,
        snapshot: Message,
    },

    /// The loop is about to dispatch a tool call.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    /// A tool call produced its text result.
    ToolResult {
        id: String,
        name: String,
        output: String,
    },

    /// The turn is over.
    Finished(TurnOutcome),
}

impl TurnEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Partial { .. } => "partial",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Finished(_) => "finished",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}
