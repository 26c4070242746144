//! DuckDuckGo search tool.
//!
//! Queries the JavaScript-free HTML endpoint and scrapes result anchors and
//! snippets out of the markup. At most [`MAX_RESULTS`] results are rendered.

use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use wela_core::error::ToolError;
use wela_core::tool::{Tool, ToolParameters};

use crate::required_str;

pub const MAX_RESULTS: usize = 10;

pub struct DuckDuckGoSearchTool {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, PartialEq)]
struct SearchResult {
    title: String,
    href: String,
    body: String,
}

impl DuckDuckGoSearchTool {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn search(&self, keywords: &str) -> Result<Vec<SearchResult>, String> {
        let url = format!("{}/html/", self.base_url);
        debug!(%url, %keywords, "Searching DuckDuckGo");
        let html = self
            .client
            .get(url)
            .query(&[("q", keywords), ("kp", "-2")])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| e.to_string())?
            .text()
            .await
            .map_err(|e| e.to_string())?;
        parse_results(&html).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearchTool {
    fn name(&self) -> &str {
        "duckduckgo_search"
    }

    fn description(&self) -> &str {
        "Use DuckDuckGo to search for information on the Internet."
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::object()
            .property(
                "keywords",
                "string",
                "keywords for query, you can use advanced syntax on DuckDuckGo Search.",
            )
            .require("keywords")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let keywords = required_str(&arguments, "keywords")?;
        match self.search(keywords).await {
            Ok(results) => Ok(render(keywords, &results)),
            Err(e) => {
                warn!(%keywords, error = %e, "Search failed");
                Ok(e)
            }
        }
    }
}

fn render(keywords: &str, results: &[SearchResult]) -> String {
    let mut out = format!("Here are the search results for '{keywords}':\n\n");
    for r in results {
        out.push_str(&format!("title: {}\nurl: {}\nbody: {}\n\n", r.title, r.href, r.body));
    }
    out.trim().to_string()
}

fn parse_results(html: &str) -> Result<Vec<SearchResult>, regex_lite::Error> {
    let anchor = Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)?;
    let snippet = Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#)?;
    let tag = Regex::new(r"<[^>]+>")?;

    let anchors: Vec<_> = anchor.captures_iter(html).collect();
    let mut results = Vec::new();
    for (i, caps) in anchors.iter().enumerate() {
        // A snippet belongs to the anchor it follows, up to the next anchor.
        let start = caps.get(0).map_or(0, |m| m.end());
        let end = anchors
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let body = snippet
            .captures(&html[start..end])
            .map(|c| clean(&tag, &c[1]))
            .unwrap_or_default();

        results.push(SearchResult {
            title: clean(&tag, &caps[2]),
            href: resolve_href(&unescape(&caps[1])),
            body,
        });
        if results.len() == MAX_RESULTS {
            break;
        }
    }
    Ok(results)
}

fn clean(tag: &Regex, fragment: &str) -> String {
    let text = tag.replace_all(fragment, "");
    unescape(text.split_whitespace().collect::<Vec<_>>().join(" ").as_str())
}

pub(crate) fn unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Result links go through a `/l/?uddg=<target>` redirect.
fn resolve_href(href: &str) -> String {
    if let Some((_, rest)) = href.split_once("uddg=") {
        let target = rest.split('&').next().unwrap_or_default();
        if let Ok(decoded) = urlencoding::decode(target) {
            return decoded.into_owned();
        }
    }
    match href.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => href.to_string(),
    }
}
