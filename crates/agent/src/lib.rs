//! The turn loop and everything built on it.
//!
//! A turn follows a **call → dispatch → repeat** cycle:
//!
//! 1. **Send** the conversation to the model, offering tools while budget remains
//! 2. **If tool calls**: run each one in order, append the results, loop back
//! 3. **If text**: return it as the turn's answer
//!
//! Streaming clients are reassembled fragment by fragment so partial text
//! can be shown while the turn is still running.

pub mod reassembler;
pub mod sequential;
pub mod stream_event;
pub mod template;
pub mod turn_loop;

#[cfg(test)]
mod test_helpers;

pub use reassembler::{ChoiceReassembler, MessageAccumulator, Partial, StreamReassembler, ToolCallAccumulator};
pub use sequential::{SequentialAgent, SequentialOutcome, Stage};
pub use stream_event::TurnEvent;
pub use template::{ChatTemplate, PromptTemplate, Variables};
pub use turn_loop::{TurnLoop, TurnOutcome};
