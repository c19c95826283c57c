//! Configuration loading

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Locate `filename` in the current directory or any ancestor, falling
/// back to the global config at `~/.config/eigent/`.
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    if let Some(found) = cwd
        .ancestors()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.exists())
    {
        return Some(found);
    }

    dirs::config_dir()
        .map(|dir| dir.join("eigent").join(filename))
        .filter(|global| global.exists())
}

/// Top-level workforce configuration (from .workforce.toml)
#[derive(Debug, Default, Deserialize)]
pub struct WorkforceFileConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub workforce: WorkforceSectionConfig,
    #[serde(default)]
    pub browser: BrowserSectionConfig,
}

/// LLM configuration section
#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
}

/// Workforce configuration section
#[derive(Debug, Deserialize)]
pub struct WorkforceSectionConfig {
    #[serde(default = "default_task_timeout_seconds")]
    pub task_timeout_seconds: u64,
    #[serde(default = "default_graceful_shutdown_seconds")]
    pub graceful_shutdown_seconds: u64,
    #[serde(default)]
    pub share_memory: bool,
    #[serde(default = "default_max_task_retries")]
    pub max_task_retries: u32,
}

/// Browser configuration section
#[derive(Debug, Deserialize)]
pub struct BrowserSectionConfig {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_bridge_command")]
    pub bridge_command: String,
    #[serde(default = "default_start_url")]
    pub start_url: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_task_timeout_seconds() -> u64 {
    900
}

fn default_graceful_shutdown_seconds() -> u64 {
    30
}

fn default_max_task_retries() -> u32 {
    3
}

fn default_bridge_command() -> String {
    "eigent-browser-bridge".to_string()
}

fn default_start_url() -> String {
    "https://search.brave.com/".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

impl Default for WorkforceSectionConfig {
    fn default() -> Self {
        Self {
            task_timeout_seconds: default_task_timeout_seconds(),
            graceful_shutdown_seconds: default_graceful_shutdown_seconds(),
            share_memory: false,
            max_task_retries: default_max_task_retries(),
        }
    }
}

impl Default for BrowserSectionConfig {
    fn default() -> Self {
        Self {
            headless: false,
            bridge_command: default_bridge_command(),
            start_url: default_start_url(),
        }
    }
}

impl WorkforceFileConfig {
    /// Load config from .workforce.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .workforce.toml
    /// 2. Check ~/.config/eigent/.workforce.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(".workforce.toml") {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No .workforce.toml found, using defaults");
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WorkforceFileConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Resolve the working directory for agents and downloads.
///
/// Honors the `CAMEL_WORKDIR` environment variable; otherwise uses
/// `working_dir/` under the current directory. The directory is created
/// if missing.
pub fn working_directory() -> std::io::Result<PathBuf> {
    let dir = match std::env::var("CAMEL_WORKDIR") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => std::env::current_dir()?.join("working_dir"),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkforceFileConfig::default();
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.workforce.task_timeout_seconds, 900);
        assert_eq!(config.workforce.graceful_shutdown_seconds, 30);
        assert!(!config.workforce.share_memory);
        assert_eq!(config.browser.start_url, "https://search.brave.com/");
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".workforce.toml");
        std::fs::write(
            &path,
            r#"
[llm]
model = "gpt-4o-mini"

[workforce]
task_timeout_seconds = 60
share_memory = true

[browser]
headless = true
"#,
        )
        .unwrap();

        let config = WorkforceFileConfig::load_from_path(&path).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.workforce.task_timeout_seconds, 60);
        assert!(config.workforce.share_memory);
        assert!(config.browser.headless);
        // Unset fields keep their defaults
        assert_eq!(config.workforce.graceful_shutdown_seconds, 30);
    }
}
