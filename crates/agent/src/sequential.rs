//! Sequential chaining of turns.
//!
//! Each stage renders its chat template from the current variables, runs a
//! turn, and binds the final content under its output key. Later stages can
//! refer to earlier outputs by name.

use tracing::debug;

use crate::template::{ChatTemplate, Variables};
use crate::turn_loop::{TurnLoop, TurnOutcome};

/// Variable name holding the caller's input.
pub const INPUT_KEY: &str = "input";

/// Variable name a stage binds its output to unless told otherwise.
pub const OUTPUT_KEY: &str = "output";

pub struct Stage {
    turn: TurnLoop,
    template: ChatTemplate,
    output_key: String,
}

impl Stage {
    pub fn new(turn: TurnLoop, template: ChatTemplate) -> Self {
        Self {
            turn,
            template,
            output_key: OUTPUT_KEY.into(),
        }
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }
}

#[derive(Debug, Clone)]
pub struct SequentialOutcome {
    /// Inputs plus every stage output
    pub variables: Variables,

    /// One outcome per stage, in order
    pub stages: Vec<TurnOutcome>,
}

impl SequentialOutcome {
    /// The last stage's outcome, if any stage ran.
    pub fn last(&self) -> Option<&TurnOutcome> {
        self.stages.last()
    }
}

#[derive(Default)]
pub struct SequentialAgent {
    stages: Vec<Stage>,
}

impl SequentialAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order.
    pub async fn run(&self, mut variables: Variables) -> SequentialOutcome {
        let mut outcomes = Vec::with_capacity(self.stages.len());
        for (i, stage) in self.stages.iter().enumerate() {
            debug!(stage = i, output_key = %stage.output_key, "Running stage");
            let conversation = stage.template.format(&variables);
            let outcome = stage.turn.run(conversation).await;
            variables.insert(stage.output_key.clone(), outcome.message.text().to_string());
            outcomes.push(outcome);
        }
        SequentialOutcome {
            variables,
            stages: outcomes,
        }
    }

    /// Convenience for a single input bound under [`INPUT_KEY`].
    pub async fn run_input(&self, input: impl Into<String>) -> SequentialOutcome {
        let mut variables = Variables::new();
        variables.insert(INPUT_KEY.into(), input.into());
        self.run(variables).await
    }
}
