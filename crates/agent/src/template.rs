//! Prompt templates with `{name}` placeholders.
//!
//! `{{` and `}}` produce literal braces. Placeholders without a binding are
//! left in place so a missing variable is visible in the rendered prompt.

use std::collections::HashMap;

use wela_core::message::{Conversation, Message, Role};

pub type Variables = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn format(&self, variables: &Variables) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                out.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                out.push('}');
                rest = &tail[1..];
                continue;
            }

            match tail[1..].find('}') {
                Some(end) => {
                    let name = &tail[1..=end];
                    match variables.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&tail[..end + 2]),
                    }
                    rest = &tail[end + 2..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl From<&str> for PromptTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

/// An ordered list of role/template pairs rendered into a conversation.
#[derive(Debug, Clone, Default)]
pub struct ChatTemplate {
    messages: Vec<(Role, PromptTemplate)>,
}

impl ChatTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(self, template: impl Into<PromptTemplate>) -> Self {
        self.message(Role::System, template)
    }

    pub fn user(self, template: impl Into<PromptTemplate>) -> Self {
        self.message(Role::User, template)
    }

    pub fn assistant(self, template: impl Into<PromptTemplate>) -> Self {
        self.message(Role::Assistant, template)
    }

    pub fn message(mut self, role: Role, template: impl Into<PromptTemplate>) -> Self {
        self.messages.push((role, template.into()));
        self
    }

    pub fn format(&self, variables: &Variables) -> Conversation {
        self.messages
            .iter()
            .map(|(role, template)| Message {
                role: *role,
                content: Some(template.format(variables)),
                ..Message::default()
            })
            .collect::<Vec<_>>()
            .into()
    }
}
