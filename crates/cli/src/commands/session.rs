//! Wiring shared by the commands that start runs: config, provider, workspace, catalog.

use std::sync::Arc;
use std::time::Duration;

use stepwise_agent::AgentLoop;
use stepwise_config::AppConfig;
use stepwise_core::run::RunConfig;
use stepwise_core::tool::ToolCatalog;
use stepwise_security::CommandPolicy;
use stepwise_tools::{LocalWorkspaceOptions, default_catalog, local_workspace};
use tracing::info;

use crate::GlobalOptions;

/// Providers that run locally and need no API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

pub struct Session {
    pub agent: AgentLoop,
    pub catalog: Arc<ToolCatalog>,
    pub run_config: RunConfig,
    pub provider: String,
    pub root: std::path::PathBuf,
}

impl Session {
    pub fn build(options: &GlobalOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        Self::from_config(&config, options)
    }

    pub fn from_config(
        config: &AppConfig,
        options: &GlobalOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let provider_name = config.default_provider.clone();
        if config.api_key_for(&provider_name).is_none()
            && !KEYLESS_PROVIDERS.contains(&provider_name.as_str())
        {
            print_missing_key_help();
            return Err("No API key found. See above for setup instructions.".into());
        }

        let router = stepwise_providers::build_from_config(config);
        let provider = router.default_provider()?;

        let root = options
            .workspace
            .clone()
            .unwrap_or_else(|| config.workspace.root.clone());
        let root = std::fs::canonicalize(&root)
            .map_err(|e| format!("Workspace {} is not accessible: {e}", root.display()))?;

        let workspace = local_workspace(&LocalWorkspaceOptions {
            root: root.clone(),
            forbidden_paths: config.workspace.forbidden_paths.clone(),
            max_file_bytes: config.workspace.max_file_bytes,
            command_timeout: Duration::from_secs(config.workspace.command_timeout_secs),
        });
        let catalog = Arc::new(default_catalog(CommandPolicy::new(
            config.workspace.allowed_commands.clone(),
        )));

        let run_config = apply_overrides(config.run_config(), options);
        info!(
            provider = %provider_name,
            model = %run_config.model,
            workspace = %root.display(),
            "Session ready"
        );

        Ok(Self {
            agent: AgentLoop::new(provider, workspace),
            catalog,
            run_config,
            provider: provider_name,
            root,
        })
    }
}

/// Apply command-line overrides on top of the configured run settings.
pub fn apply_overrides(mut run_config: RunConfig, options: &GlobalOptions) -> RunConfig {
    if let Some(model) = &options.model {
        run_config.model = model.clone();
    }
    if let Some(max) = options.max_iterations {
        run_config.max_iterations = max.max(1);
    }
    run_config
}

fn print_missing_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export OPENROUTER_API_KEY='sk-or-v1-...'   (recommended)");
    eprintln!("    export OPENAI_API_KEY='sk-...'             (for OpenAI direct)");
    eprintln!("    export ANTHROPIC_API_KEY='sk-ant-...'      (for Anthropic direct)");
    eprintln!("    export STEPWISE_API_KEY='sk-...'           (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply() {
        let options = GlobalOptions {
            workspace: None,
            model: Some("gpt-4o".into()),
            max_iterations: Some(0),
        };
        let rc = apply_overrides(RunConfig::default().with_model("default"), &options);
        assert_eq!(rc.model, "gpt-4o");
        assert_eq!(rc.max_iterations, 1);
    }

    #[test]
    fn no_overrides_keep_config() {
        let rc = apply_overrides(
            RunConfig::default().with_model("default"),
            &GlobalOptions::default(),
        );
        assert_eq!(rc.model, "default");
        assert_eq!(rc.max_iterations, 10);
    }

    #[test]
    fn keyless_local_provider_builds() {
        let dir = std::env::temp_dir();
        let config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        let options = GlobalOptions {
            workspace: Some(dir),
            ..GlobalOptions::default()
        };
        let session = Session::from_config(&config, &options).unwrap();
        assert_eq!(session.provider, "ollama");
        assert_eq!(session.catalog.len(), 9);
    }

    #[test]
    fn missing_key_is_rejected() {
        let config = AppConfig {
            api_key: None,
            default_provider: "openrouter".into(),
            ..AppConfig::default()
        };
        assert!(Session::from_config(&config, &GlobalOptions::default()).is_err());
    }
}
