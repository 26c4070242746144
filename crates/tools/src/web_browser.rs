//! Webpage visiting tool.
//!
//! Fetches a page, strips it down to readable text, then hands the text to
//! a nested turn that pulls out whatever helps answer the caller's question.
//! The nested turn offers no tools.

use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use wela_agent::{PromptTemplate, TurnLoop, Variables};
use wela_core::error::ToolError;
use wela_core::message::{Conversation, Message};
use wela_core::tool::{Tool, ToolParameters};

use crate::required_str;
use crate::web_search::unescape;

/// Page text beyond this many characters is cut before summarising.
pub const MAX_PAGE_CHARS: usize = 24_000;

const EXTRACT_PROMPT: &str = "Based on the above content, extract as comprehensively as possible the content that helps answer the following question: {question}";
const FORMAT_HINT: &str = "Output in the following format:\nContent_1\nContent_2\n...";

pub struct WebBrowserTool {
    client: reqwest::Client,
    summariser: TurnLoop,
}

impl WebBrowserTool {
    pub fn new(client: reqwest::Client, summariser: TurnLoop) -> Self {
        Self { client, summariser }
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        debug!(%url, "Visiting webpage");
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    async fn summarise(&self, content: String, question: &str) -> String {
        let mut variables = Variables::new();
        variables.insert("question".into(), question.to_string());

        let conversation = Conversation::from(vec![
            Message::user(content),
            Message::user(PromptTemplate::new(EXTRACT_PROMPT).format(&variables)),
            Message::system(FORMAT_HINT),
        ]);
        let outcome = self.summariser.run(conversation).await;
        outcome.message.text().to_string()
    }
}

#[async_trait]
impl Tool for WebBrowserTool {
    fn name(&self) -> &str {
        "visit_webpage"
    }

    fn description(&self) -> &str {
        "A web browser for visiting a specific URL."
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::object()
            .property("url", "string", "The url to visit.")
            .property(
                "question",
                "string",
                "What question do you want to answer by browsing this webpage.",
            )
            .require("url")
            .require("question")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let url = required_str(&arguments, "url")?;
        let question = required_str(&arguments, "question")?;

        let html = match self.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "Failed to fetch webpage");
                return Ok(e.to_string());
            }
        };
        let content = extract_text(&html).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.summarise(truncate(content, MAX_PAGE_CHARS), question).await)
    }
}

/// Reduce an HTML document to its visible text, one block per line.
fn extract_text(html: &str) -> Result<String, regex_lite::Error> {
    let hidden = Regex::new(
        r"(?is)<!--.*?-->|<head\b.*?</head>|<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>|<svg\b.*?</svg>",
    )?;
    let block = Regex::new(
        r"(?i)<(?:br|/?p|/?div|/?li|/?h[1-6]|/?tr|/?section|/?article|/?blockquote|/?pre|/?table|/?ul|/?ol)\b[^>]*>",
    )?;
    let tag = Regex::new(r"<[^>]+>")?;

    let text = hidden.replace_all(html, "");
    let text = block.replace_all(&text, "\n");
    let text = tag.replace_all(&text, "");

    Ok(text
        .lines()
        .map(|line| unescape(&line.split_whitespace().collect::<Vec<_>>().join(" ")))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn truncate(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
    }
    text
}
