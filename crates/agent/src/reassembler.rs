//! Rebuilds complete assistant messages from streamed fragments.
//!
//! Merge rules, applied per fragment in arrival order:
//!
//! - `role` is taken from the first fragment that supplies one
//! - `content` increments are appended
//! - tool-call entries are addressed by their `index` (or position in the
//!   fragment); `id`/`type` are overwritten only by non-empty values, `name`
//!   whenever supplied, and `arguments` are appended
//!
//! Text is surfaced as a [`Partial`] while no tool call has been seen.
//! Fragments that build tool calls are never surfaced.

use serde::Serialize;
use wela_core::fragment::{FragmentBatch, PartialFragment, ToolCallFragment};
use wela_core::message::{FUNCTION_KIND, Message, MessageToolCall, Role};

/// A text increment and the message accumulated so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partial {
    pub delta: String,
    pub snapshot: Message,
}

/// One tool call under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallAccumulator {
    id: String,
    kind: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn merge(&mut self, fragment: &ToolCallFragment) {
        if let Some(id) = fragment.id.as_deref().filter(|s| !s.is_empty()) {
            self.id = id.to_string();
        }
        if let Some(kind) = fragment.kind.as_deref().filter(|s| !s.is_empty()) {
            self.kind = kind.to_string();
        }
        if let Some(function) = &fragment.function {
            if let Some(name) = &function.name {
                self.name.clone_from(name);
            }
            if let Some(arguments) = &function.arguments {
                self.arguments.push_str(arguments);
            }
        }
    }

    pub fn to_tool_call(&self) -> MessageToolCall {
        MessageToolCall {
            id: self.id.clone(),
            kind: if self.kind.is_empty() {
                FUNCTION_KIND.to_string()
            } else {
                self.kind.clone()
            },
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// Accumulated state of one completion.
#[derive(Debug, Clone, Default)]
pub struct MessageAccumulator {
    role: Option<Role>,
    content: String,
    tool_calls: Vec<ToolCallAccumulator>,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_role(&mut self, role: Option<Role>) {
        if self.role.is_none() {
            self.role = role;
        }
    }

    pub fn merge_content(&mut self, content: Option<&str>) {
        if let Some(text) = content {
            self.content.push_str(text);
        }
    }

    pub fn merge_tool_calls(&mut self, entries: &[ToolCallFragment]) {
        if entries.is_empty() {
            return;
        }
        if self.tool_calls.is_empty() {
            self.tool_calls.resize_with(entries.len(), Default::default);
        }
        for (position, entry) in entries.iter().enumerate() {
            let slot = entry.index.unwrap_or(position);
            if slot >= self.tool_calls.len() {
                self.tool_calls.resize_with(slot + 1, Default::default);
            }
            self.tool_calls[slot].merge(entry);
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The message as accumulated so far.
    pub fn snapshot(&self) -> Message {
        let tool_calls: Vec<MessageToolCall> = self
            .tool_calls
            .iter()
            .map(ToolCallAccumulator::to_tool_call)
            .collect();
        let content = if self.content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(self.content.clone())
        };
        Message {
            role: self.role.unwrap_or_default(),
            content,
            tool_calls,
            tool_call_id: None,
        }
    }
}

/// Reassembles a single completion's fragment sequence.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    accumulator: MessageAccumulator,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment, returning a partial when it carried visible text.
    pub fn push(&mut self, fragment: &PartialFragment) -> Option<Partial> {
        let acc = &mut self.accumulator;
        acc.merge_role(fragment.role);
        acc.merge_content(fragment.content.as_deref());
        if let Some(entries) = &fragment.tool_calls {
            acc.merge_tool_calls(entries);
        }

        let delta = fragment.content.as_deref().filter(|s| !s.is_empty())?;
        if acc.has_tool_calls() {
            return None;
        }
        Some(Partial {
            delta: delta.to_string(),
            snapshot: acc.snapshot(),
        })
    }

    pub fn snapshot(&self) -> Message {
        self.accumulator.snapshot()
    }

    /// End of sequence: the fully reassembled message.
    pub fn finish(self) -> Message {
        self.accumulator.snapshot()
    }
}

/// Demultiplexes fragment batches by completion index, one
/// [`StreamReassembler`] per slot.
#[derive(Debug)]
pub struct ChoiceReassembler {
    choices: Vec<StreamReassembler>,
}

impl ChoiceReassembler {
    pub fn new(completions: usize) -> Self {
        Self {
            choices: (0..completions.max(1)).map(|_| StreamReassembler::new()).collect(),
        }
    }

    /// Merge a batch. Returns `(choice, partial)` for every slot that
    /// produced visible text.
    pub fn push(&mut self, batch: &FragmentBatch) -> Vec<(usize, Partial)> {
        if batch.len() > self.choices.len() {
            self.choices.resize_with(batch.len(), StreamReassembler::new);
        }
        batch
            .iter()
            .enumerate()
            .filter_map(|(choice, slot)| {
                let fragment = slot.as_ref()?;
                self.choices[choice].push(fragment).map(|p| (choice, p))
            })
            .collect()
    }

    pub fn finish(self) -> Vec<Message> {
        self.choices.into_iter().map(StreamReassembler::finish).collect()
    }
}
