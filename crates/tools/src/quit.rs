//! Quit tool. Lets the model end the chat with a parting line.

use async_trait::async_trait;
use serde_json::{Map, Value};
use wela_core::error::ToolError;
use wela_core::tool::{Tool, ToolParameters};

use crate::required_str;

pub struct QuitTool;

#[async_trait]
impl Tool for QuitTool {
    fn name(&self) -> &str {
        "quit"
    }

    fn description(&self) -> &str {
        "End the conversation with the user and exit the chat."
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::object()
            .property(
                "goodbye_words",
                "string",
                "What do you want to say before quitting.",
            )
            .require("goodbye_words")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let words = required_str(&arguments, "goodbye_words")?;
        Ok(format!("You need repeat '{words}'"))
    }
}
