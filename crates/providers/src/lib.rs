//! Chat-completion provider implementations for Wela.
//!
//! Providers implement the `wela_core` provider traits. [`build_client`]
//! picks the batch or streaming variant once, from configuration.

pub mod openai_compat;
pub mod scripted;

use std::sync::Arc;

use wela_config::AppConfig;
use wela_core::provider::ModelClient;

pub use openai_compat::OpenAiCompatProvider;
pub use scripted::{ScriptedProvider, ScriptedReply};

/// Build the model client described by the configuration.
pub fn build_client(config: &AppConfig) -> ModelClient {
    let provider = Arc::new(
        OpenAiCompatProvider::new(
            provider_name(&config.base_url),
            &config.base_url,
            config.api_key.clone().unwrap_or_default(),
            &config.model,
        )
        .with_sampling(config.sampling.to_params()),
    );

    if config.stream {
        ModelClient::Streaming(provider)
    } else {
        ModelClient::Complete(provider)
    }
}

/// A short provider label derived from the endpoint host.
fn provider_name(base_url: &str) -> String {
    let host = base_url
        .split("://")
        .nth(1)
        .unwrap_or(base_url)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    match host {
        "api.openai.com" => "openai".into(),
        "openrouter.ai" => "openrouter".into(),
        "localhost" | "127.0.0.1" => "local".into(),
        "" => "custom".into(),
        other => other.to_string(),
    }
}
