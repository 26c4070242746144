//! Noun definitions from DuckDuckGo's instant-answer API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use wela_core::error::ToolError;
use wela_core::tool::{Tool, ToolParameters};

use crate::required_str;

pub struct DefinitionTool {
    base_url: String,
    client: reqwest::Client,
}

impl DefinitionTool {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn lookup(&self, noun: &str) -> Result<InstantAnswer, reqwest::Error> {
        let query = format!("what is {noun}");
        debug!(base_url = %self.base_url, %query, "Looking up definition");
        self.client
            .get(format!("{}/", self.base_url))
            .query(&[("q", query.as_str()), ("format", "json"), ("no_html", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl Tool for DefinitionTool {
    fn name(&self) -> &str {
        "get_definition"
    }

    fn description(&self) -> &str {
        "Get the definition of a given noun"
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::object()
            .property(
                "given_noun",
                "string",
                "Given noun to be defined. It MUST be in English.",
            )
            .require("given_noun")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let noun = required_str(&arguments, "given_noun")?;
        match self.lookup(noun).await {
            Ok(answer) => Ok(answer
                .best()
                .map(str::to_string)
                .unwrap_or_else(|| format!("No definition found for '{noun}'"))),
            Err(e) => {
                warn!(%noun, error = %e, "Definition lookup failed");
                Ok(e.to_string())
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    abstract_text: String,
    #[serde(default)]
    definition: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    #[serde(default)]
    text: String,
}

impl InstantAnswer {
    /// The abstract, else the dictionary definition, else the first related
    /// topic.
    fn best(&self) -> Option<&str> {
        [self.abstract_text.as_str(), self.definition.as_str()]
            .into_iter()
            .chain(self.related_topics.iter().map(|t| t.text.as_str()))
            .find(|text| !text.trim().is_empty())
    }
}
