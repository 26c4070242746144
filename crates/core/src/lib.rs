//! # Wela Core
//!
//! Domain types, traits, and error definitions for the Wela turn loop.
//! This crate has **no transport dependencies** — it defines the domain model
//! that the provider, tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping language-model backends via configuration
//! - Easy testing with scripted providers and stub tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod fragment;
pub mod message;
pub mod param;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, ToolError};
pub use fragment::{FragmentBatch, FunctionFragment, PartialFragment, ToolCallFragment};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use param::{Param, StopSequences};
pub use provider::{
    CompletionProvider, FragmentStream, FunctionDefinition, ModelClient, Prediction, ProviderRequest,
    RawFragmentStream, SamplingParams, StreamingProvider, ToolDefinition,
};
pub use tool::{Tool, ToolEvent, ToolHooks, ToolParameters, ToolRegistry, TracingHooks};
