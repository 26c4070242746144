//! The turn loop: call the model, dispatch requested tools, repeat.
//!
//! A turn is bounded by `max_iterations` model calls. Tools are offered on
//! every call except the last, so the final call is always expected to
//! produce an answer. If the model still asks for tools on the last call,
//! its message is returned untouched and the outcome is marked truncated.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wela_config::AgentConfig;
use wela_core::message::{Conversation, Message, MessageToolCall};
use wela_core::param::{Param, StopSequences};
use wela_core::provider::{FragmentStream, ModelClient, Prediction, ProviderRequest};
use wela_core::tool::ToolRegistry;

use crate::reassembler::ChoiceReassembler;
use crate::stream_event::TurnEvent;

/// The result of one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// The final assistant message; not appended to `conversation`
    pub message: Message,

    /// The iteration budget ran out while the model still wanted tools
    pub truncated: bool,

    /// Model calls made
    pub iterations: usize,

    pub tool_calls_made: usize,

    /// Input messages plus every assistant/tool message exchanged
    pub conversation: Conversation,
}

/// Orchestrates model calls and tool dispatch for a single turn.
#[derive(Clone)]
pub struct TurnLoop {
    client: ModelClient,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    stop: Param<StopSequences>,
    max_tokens: Param<u32>,
    completions: Param<u32>,
}

impl TurnLoop {
    pub fn new(client: ModelClient) -> Self {
        Self {
            client,
            tools: Arc::new(ToolRegistry::new()),
            max_iterations: 5,
            stop: Param::Omitted,
            max_tokens: Param::Omitted,
            completions: Param::Omitted,
        }
    }

    /// Apply the `[agent]` section of the configuration.
    pub fn configured(self, config: &AgentConfig) -> Self {
        let mut this = self.with_max_iterations(config.max_iterations);
        this.stop = config.stop_sequences().into();
        this.max_tokens = config.max_tokens.into();
        this
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Maximum model calls per turn. Zero is treated as one.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_stop(mut self, stop: impl Into<StopSequences>) -> Self {
        self.stop = Param::Value(stop.into());
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Param::Value(max);
        self
    }

    /// Ask for `n` candidate completions per call. Only the first drives
    /// the loop.
    pub fn with_completions(mut self, n: u32) -> Self {
        self.completions = Param::Value(n);
        self
    }

    pub fn client(&self) -> &ModelClient {
        &self.client
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn is_last(&self, iteration: usize) -> bool {
        iteration + 1 >= self.max_iterations
    }

    fn request(&self, conversation: &Conversation, iteration: usize) -> ProviderRequest {
        let offer_tools = !self.is_last(iteration) && !self.tools.is_empty();
        debug!(iteration, offer_tools, "Turn loop iteration");
        ProviderRequest {
            messages: conversation.messages().to_vec(),
            max_tokens: self.max_tokens,
            n: self.completions,
            stop: self.stop.clone(),
            tools: if offer_tools {
                self.tools.definitions()
            } else {
                Vec::new()
            },
        }
    }

    /// Whether `message` ends the turn at `iteration`.
    fn concludes(&self, iteration: usize, message: &Message) -> bool {
        if !message.has_tool_calls() {
            return true;
        }
        if self.is_last(iteration) {
            warn!(
                iterations = iteration + 1,
                pending = message.tool_calls.len(),
                "Iteration budget exhausted with pending tool calls"
            );
            return true;
        }
        false
    }

    async fn dispatch(&self, call: &MessageToolCall) -> Message {
        debug!(tool = %call.name, id = %call.id, "Dispatching tool call");
        let output = self.tools.run(call).await;
        Message::tool_result(&call.id, output)
    }

    /// Run a turn to completion.
    ///
    /// Against a streaming client the fragments are reassembled silently;
    /// use [`run_stream`](Self::run_stream) to observe them.
    pub async fn run(&self, mut conversation: Conversation) -> TurnOutcome {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            model = self.client.name(),
            "Starting turn"
        );
        let mut tool_calls_made = 0;
        let mut iteration = 0;

        loop {
            let request = self.request(&conversation, iteration);
            let message = match self.client.predict(request).await {
                Prediction::Complete(candidates) => first_candidate(candidates),
                Prediction::Stream(fragments) => drain(fragments, self.completions()).await,
            };

            if self.concludes(iteration, &message) {
                return outcome(message, iteration, tool_calls_made, conversation);
            }

            conversation.push(message.clone());
            for call in &message.tool_calls {
                let result = self.dispatch(call).await;
                conversation.push(result);
                tool_calls_made += 1;
            }
            iteration += 1;
        }
    }

    /// Run a turn, yielding partial text and tool activity as it happens.
    ///
    /// The stream ends with exactly one [`TurnEvent::Finished`]. It only
    /// advances when polled; dropping it abandons the turn.
    pub fn run_stream(&self, conversation: Conversation) -> BoxStream<'_, TurnEvent> {
        Box::pin(async_stream::stream! {
            let mut conversation = conversation;
            info!(
                conversation_id = %conversation.id,
                messages = conversation.len(),
                model = self.client.name(),
                "Starting streamed turn"
            );
            let mut tool_calls_made = 0;
            let mut iteration = 0;

            loop {
                let request = self.request(&conversation, iteration);
                let message = match self.client.predict(request).await {
                    Prediction::Complete(candidates) => first_candidate(candidates),
                    Prediction::Stream(mut fragments) => {
                        let mut choices = ChoiceReassembler::new(self.completions());
                        while let Some(batch) = fragments.next().await {
                            for (choice, partial) in choices.push(&batch) {
                                yield TurnEvent::Partial {
                                    choice,
                                    delta: partial.delta,
                                    snapshot: partial.snapshot,
                                };
                            }
                        }
                        first_candidate(choices.finish())
                    }
                };

                if self.concludes(iteration, &message) {
                    yield TurnEvent::Finished(outcome(message, iteration, tool_calls_made, conversation));
                    break;
                }

                conversation.push(message.clone());
                for call in &message.tool_calls {
                    yield TurnEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    };
                    let result = self.dispatch(call).await;
                    yield TurnEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        output: result.text().to_string(),
                    };
                    conversation.push(result);
                    tool_calls_made += 1;
                }
                iteration += 1;
            }
        })
    }

    fn completions(&self) -> usize {
        match self.completions {
            Param::Value(n) => (n as usize).max(1),
            _ => 1,
        }
    }
}

fn first_candidate(candidates: Vec<Message>) -> Message {
    candidates.into_iter().next().unwrap_or_default()
}

async fn drain(mut fragments: FragmentStream, completions: usize) -> Message {
    let mut choices = ChoiceReassembler::new(completions);
    while let Some(batch) = fragments.next().await {
        choices.push(&batch);
    }
    first_candidate(choices.finish())
}

fn outcome(
    message: Message,
    iteration: usize,
    tool_calls_made: usize,
    conversation: Conversation,
) -> TurnOutcome {
    let truncated = message.has_tool_calls();
    info!(
        iterations = iteration + 1,
        tool_calls_made, truncated, "Turn finished"
    );
    TurnOutcome {
        message,
        truncated,
        iterations: iteration + 1,
        tool_calls_made,
        conversation,
    }
}
