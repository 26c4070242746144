//! `wela config` — Configuration helpers.

use wela_config::AppConfig;

pub fn show() {
    println!("{}", AppConfig::default_toml());
}

pub fn path() {
    println!("{}", config_path().display());
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", config_path().display());

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Endpoint:    {}", config.base_url);
    println!("   Model:       {}", config.model);
    println!("   Streaming:   {}", config.stream);
    println!("   Iterations:  {}", config.agent.max_iterations);
    println!("   Tools:       {}", config.tools.enabled.join(", "));
    Ok(())
}

fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set WELA_API_KEY or OPENAI_API_KEY)".to_string());
    }
    for name in &config.tools.enabled {
        if !wela_tools::BUILTIN_TOOLS.contains(&name.as_str()) {
            warnings.push(format!("Unknown tool '{name}' will be skipped"));
        }
    }
    if config.agent.max_iterations == 1 && !config.tools.enabled.is_empty() {
        warnings.push("max_iterations = 1 means tools are never offered".to_string());
    }
    warnings
}
