//! Plan-and-execute tool.
//!
//! A planner turn writes a numbered plan and stops at [`END_OF_PLAN`]. An
//! executor turn then works through the steps one at a time. Every finished
//! step, starting with the plan itself, is shown to the executor as a system
//! message so later steps build on earlier results. The last step's result
//! is the tool output.

use std::sync::Arc;

use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};
use wela_agent::{ChatTemplate, TurnLoop, Variables};
use wela_core::error::ToolError;
use wela_core::message::{Conversation, Message};
use wela_core::provider::ModelClient;
use wela_core::tool::{Tool, ToolParameters, ToolRegistry};

use crate::required_str;

pub const END_OF_PLAN: &str = "<END_OF_PLAN>";

const PLANNER_PROMPT: &str = "Let's first understand the problem and devise a plan to solve the problem.
Please output the plan starting with the header 'Plan:' and then followed by a numbered list of steps.
Please make the plan the minimum number of steps required to accurately complete the task.
At the end of your plan, say '<END_OF_PLAN>'.";

const EXECUTOR_PROMPT: &str = "Perform the following tasks: {current_task}.
Take into account previously completed tasks above.

This task is a step based on the following objectives: {objective}.
And here is the additional information you need to know:
{additional}.
But for now, you just need to focus on the current task.";

const PLAN_TASK_NAME: &str = "Make a todo list";

#[derive(Debug, Clone, PartialEq)]
struct CompletedTask {
    name: String,
    result: String,
}

impl CompletedTask {
    fn to_message(&self) -> Message {
        Message::system(format!("# Task name: {}\n# Result:\n{}", self.name, self.result))
    }
}

pub struct PlanAndExecuteTool {
    planner: TurnLoop,
    executor: TurnLoop,
}

impl PlanAndExecuteTool {
    /// `executor_tools` are offered to the executor while it works on a step.
    pub fn new(client: ModelClient, executor_tools: Arc<ToolRegistry>) -> Self {
        Self {
            planner: TurnLoop::new(client.clone()).with_stop(END_OF_PLAN),
            executor: TurnLoop::new(client).with_tools(executor_tools),
        }
    }

    async fn plan(&self, objective: &str) -> String {
        let template = ChatTemplate::new().system(PLANNER_PROMPT).user("{objective}");
        let mut variables = Variables::new();
        variables.insert("objective".into(), objective.to_string());

        let outcome = self.planner.run(template.format(&variables)).await;
        outcome.message.text().to_string()
    }

    async fn execute_step(
        &self,
        step: &str,
        objective: &str,
        additional: &str,
        completed: &[CompletedTask],
    ) -> String {
        let mut variables = Variables::new();
        variables.insert("current_task".into(), step.to_string());
        variables.insert("objective".into(), objective.to_string());
        variables.insert("additional".into(), additional.to_string());

        let mut conversation: Conversation = completed
            .iter()
            .map(CompletedTask::to_message)
            .collect::<Vec<_>>()
            .into();
        let prompt = ChatTemplate::new().user(EXECUTOR_PROMPT).format(&variables);
        for message in prompt.messages() {
            conversation.push(message.clone());
        }
        conversation.push(Message::system(format!(
            "Current time is: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )));

        let outcome = self.executor.run(conversation).await;
        outcome.message.text().to_string()
    }
}

#[async_trait]
impl Tool for PlanAndExecuteTool {
    fn name(&self) -> &str {
        "plan_and_execute"
    }

    fn description(&self) -> &str {
        "Plan and execute a series of tasks to achieve an objective"
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::object()
            .property("objective", "string", "The objective to achieve")
            .property(
                "additional",
                "string",
                "Additional information for this task, such as the context of the task",
            )
            .require("objective")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let objective = required_str(&arguments, "objective")?;
        let additional = arguments
            .get("additional")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let plan = self.plan(objective).await;
        let steps = parse_steps(&plan).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        info!(%objective, steps = steps.len(), "Plan ready");

        let mut result = plan.clone();
        let mut completed = vec![CompletedTask {
            name: PLAN_TASK_NAME.into(),
            result: plan,
        }];
        for (i, step) in steps.into_iter().enumerate() {
            debug!(step = i + 1, task = %step, done = completed.len(), "Executing step");
            result = self
                .execute_step(&step, objective, additional, &completed)
                .await;
            completed.push(CompletedTask {
                name: step,
                result: result.clone(),
            });
        }
        Ok(result)
    }
}

/// Split a plan into its numbered steps. Text before the first step (the
/// `Plan:` header) is dropped.
fn parse_steps(plan: &str) -> Result<Vec<String>, regex_lite::Error> {
    let numbered = Regex::new(r"\n\s*\d+\.\s")?;
    Ok(numbered
        .split(plan)
        .skip(1)
        .map(|step| step.trim().to_string())
        .filter(|step| !step.is_empty())
        .collect())
}
