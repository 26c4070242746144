//! Partial response fragments produced by a streaming provider.
//!
//! Field layout mirrors the chat-completions `delta` object, so a provider
//! can deserialize a chunk's delta straight into a [`PartialFragment`].

use serde::{Deserialize, Serialize};

use crate::message::Role;

/// One incremental update of an assistant message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialFragment {
    /// Present only on the first fragment of a message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Text increment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool-call entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

impl PartialFragment {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_calls(entries: Vec<ToolCallFragment>) -> Self {
        Self {
            tool_calls: Some(entries),
            ..Self::default()
        }
    }
}

/// A partial tool-call entry, addressed by `index` when the provider sends
/// one and by its position in the fragment otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionFragment>,
}

impl ToolCallFragment {
    /// The opening fragment of a call: id, kind and name.
    pub fn start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            id: Some(id.into()),
            kind: Some(crate::message::FUNCTION_KIND.into()),
            function: Some(FunctionFragment {
                name: Some(name.into()),
                arguments: Some(String::new()),
            }),
        }
    }

    /// A follow-up fragment carrying only an arguments increment.
    pub fn arguments(index: usize, arguments: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            function: Some(FunctionFragment {
                name: None,
                arguments: Some(arguments.into()),
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// One slot per requested completion; `None` when a chunk carried nothing
/// for that completion index.
pub type FragmentBatch = Vec<Option<PartialFragment>>;
