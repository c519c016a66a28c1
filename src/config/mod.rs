// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for Parley.
//!
//! Handles loading and merging configuration from multiple sources:
//! - Global config: ~/.parley/config.json
//! - Workspace config: .parley.json, .parley.yaml, or .parley/config.json
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > workspace > global > defaults).

mod loader;
mod types;

pub use loader::{
    get_global_config_dir, get_global_config_path, load_config_file, load_global_config,
    load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};
pub use types::{ResolvedConfig, WorkspaceConfig};

use std::path::Path;

use crate::error::ConfigError;

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub idle_timeout_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

/// Load and merge all configuration sources for a workspace.
///
/// This is the main entry point for configuration loading.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;

    Ok(merge_config(global, workspace, cli_options))
}

/// Merge configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Workspace config (.parley.json)
/// 3. Global config (~/.parley/config.json)
/// 4. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = ResolvedConfig::default();

    if let Some(config) = global {
        apply_workspace_config(&mut result, &config);
    }

    if let Some(config) = workspace {
        apply_workspace_config(&mut result, &config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if config.provider.is_some() {
        result.provider = config.provider.clone();
    }
    if config.model.is_some() {
        result.model = config.model.clone();
    }
    if config.base_url.is_some() {
        result.base_url = config.base_url.clone();
    }
    if config.timeout_ms.is_some() {
        result.timeout_ms = config.timeout_ms;
    }
    if config.temperature.is_some() {
        result.temperature = config.temperature;
    }
    if config.top_p.is_some() {
        result.top_p = config.top_p;
    }
    if config.max_tokens.is_some() {
        result.max_tokens = config.max_tokens;
    }
    if let Some(secs) = config.idle_timeout_secs {
        result.session.idle_timeout_secs = secs;
    }
    if let Some(secs) = config.sweep_interval_secs {
        result.session.sweep_interval_secs = secs;
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if cli.provider.is_some() {
        result.provider = cli.provider.clone();
    }
    if cli.model.is_some() {
        result.model = cli.model.clone();
    }
    if cli.base_url.is_some() {
        result.base_url = cli.base_url.clone();
    }
    if let Some(secs) = cli.idle_timeout_secs {
        result.session.idle_timeout_secs = secs;
    }
    if let Some(secs) = cli.sweep_interval_secs {
        result.session.sweep_interval_secs = secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_defaults() {
        let config = merge_config(None, None, CliOptions::default());
        assert!(config.provider.is_none());
        assert_eq!(config.session.idle_timeout_secs, 3600);
    }

    #[test]
    fn test_merge_workspace_over_global() {
        let global = WorkspaceConfig {
            provider: Some("anthropic".to_string()),
            model: Some("claude-sonnet-4-20250514".to_string()),
            ..Default::default()
        };
        let workspace = WorkspaceConfig {
            provider: Some("ollama".to_string()),
            ..Default::default()
        };

        let config = merge_config(Some(global), Some(workspace), CliOptions::default());
        assert_eq!(config.provider.as_deref(), Some("ollama"));
        // Unset workspace fields fall through to global
        assert_eq!(config.model.as_deref(), Some("claude-sonnet-4-20250514"));
    }

    #[test]
    fn test_merge_cli_wins() {
        let workspace = WorkspaceConfig {
            provider: Some("openai".to_string()),
            idle_timeout_secs: Some(600),
            ..Default::default()
        };
        let cli = CliOptions {
            provider: Some("anthropic".to_string()),
            idle_timeout_secs: Some(120),
            ..Default::default()
        };

        let config = merge_config(None, Some(workspace), cli);
        assert_eq!(config.provider.as_deref(), Some("anthropic"));
        assert_eq!(config.session.idle_timeout_secs, 120);
    }

    #[test]
    fn test_load_config_with_workspace_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".parley.json"),
            r#"{"provider": "openai", "model": "gpt-4o", "sweepIntervalSecs": 60}"#,
        )
        .unwrap();

        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        assert_eq!(config.provider.as_deref(), Some("openai"));
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.session.sweep_interval_secs, 60);
    }
}
