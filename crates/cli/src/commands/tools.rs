//! `wela tools` — Print the tool schema the model is offered.

use wela_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let model = wela_providers::build_client(&config);
    let registry = wela_tools::default_registry(&config.tools, &model);
    println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
    Ok(())
}
