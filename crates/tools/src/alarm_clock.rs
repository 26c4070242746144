//! Alarm clock tool.
//!
//! Scheduling is left to whatever consumes the tool call; the model only
//! needs to be told the alarm was accepted.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;
use wela_core::error::ToolError;
use wela_core::tool::{Tool, ToolParameters};

use crate::required_str;

pub struct AlarmClockTool;

#[async_trait]
impl Tool for AlarmClockTool {
    fn name(&self) -> &str {
        "set_alarm_clock"
    }

    fn description(&self) -> &str {
        "Set an alarm to notify at a specific date and time for you."
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::object()
            .property(
                "date_time",
                "string",
                "The date and time to set the alarm, in the format 'YYYY-MM-DD HH:MM'.",
            )
            .property(
                "reason",
                "string",
                "The reason for setting the alarm. IMPORTANT!!! You SHOULD take note of all information that might be needed.",
            )
            .require("date_time")
            .require("reason")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let date_time = required_str(&arguments, "date_time")?;
        let reason = required_str(&arguments, "reason")?;
        info!(%date_time, %reason, "Alarm requested");
        Ok("Alarm clock set successfully".into())
    }
}
