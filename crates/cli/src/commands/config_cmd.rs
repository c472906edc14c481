//! `stepwise config`: configuration management commands.

use stepwise_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = collect_warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.default_provider);
            println!("   Model:       {}", config.model());
            println!("   Iterations:  {}", config.agent.max_iterations);
            println!(
                "   Retries:     {} attempt(s), {}ms base delay",
                config.agent.retry_attempts, config.agent.retry_base_delay_ms
            );
            println!("   Workspace:   {}", config.workspace.root.display());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Settings that load fine but are probably not what the user wants.
fn collect_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.api_key_for(&config.default_provider).is_none()
        && !matches!(config.default_provider.as_str(), "ollama" | "vllm" | "llamacpp")
    {
        warnings.push(
            "No API key set (set STEPWISE_API_KEY or the provider's own key env var)".to_string(),
        );
    }

    if config.workspace.allowed_commands.is_empty() {
        warnings.push("workspace.allowed_commands is empty: run_command may run anything".into());
    }

    if !config.workspace.root.exists() {
        warnings.push(format!(
            "Workspace root {} does not exist",
            config.workspace.root.display()
        ));
    }

    if config.agent.retry_attempts == 1 {
        warnings.push("agent.retry_attempts = 1 disables retries of transient errors".into());
    }

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(&config)?);
    Ok(())
}

/// TOML rendering with every API key masked.
fn redacted_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut config = config.clone();
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("[REDACTED]".into());
        }
    };
    mask(&mut config.api_key);
    for provider in config.providers.values_mut() {
        mask(&mut provider.api_key);
    }
    toml::to_string_pretty(&config)
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();
    if config_path.exists() && !force {
        println!("   Config already exists at {}", config_path.display());
        println!("   Use --force to overwrite it.");
        return Ok(());
    }

    std::fs::create_dir_all(AppConfig::config_dir())?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("   ✅ Wrote default config to {}", config_path.display());
    Ok(())
}
