//! `load_config`: reads the optional YAML config file and applies environment overrides.
//!
//! This is the only place where user-supplied YAML is parsed. Every section and
//! every key has a default, so an empty file (or no file at all) yields a
//! working configuration. Secrets are never read from YAML: the LLM key comes
//! from the environment when the client is built (see [`crate::openai`]).
//!
//! # Environment
//! - `PORT` overrides `server.port`.
//!
//! # Errors
//! All errors use `anyhow::Error` and surface at the CLI boundary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bookgen_core::render::RenderOptions;
use bookgen_core::PipelineConfig;
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookgenConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub generation: GenerationSection,
    pub storage: StorageSection,
    pub render: RenderSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Base URL of an OpenAI-compatible API, without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: Option<u64>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub max_concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub output_dir: PathBuf,
    pub isolate_requests: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./books"),
            isolate_requests: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    pub author: Option<String>,
}

impl BookgenConfig {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_concurrent_requests: self.generation.max_concurrent_requests,
            isolate_requests: self.storage.isolate_requests,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            author: self.render.author.clone(),
            ..RenderOptions::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Apply environment overrides (`PORT`). Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => {
                    info!(port, "PORT override from environment");
                    self.server.port = port;
                }
                Err(e) => warn!(error = %e, raw = %raw, "Ignoring invalid PORT"),
            }
        }
    }
}

/// Loads a YAML config file. Secrets are not part of the file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BookgenConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let config: BookgenConfig = if content.trim().is_empty() {
        BookgenConfig::default()
    } else {
        serde_yaml::from_str(&content).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            anyhow::anyhow!("Failed to parse config YAML: {e}")
        })?
    };
    info!(config_path = ?path_ref, "Parsed config YAML successfully");
    Ok(config)
}

/// Config for a CLI invocation: the file when given, defaults otherwise, then env overrides.
pub fn resolve_config(path: Option<&Path>) -> Result<BookgenConfig> {
    let mut config = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Could not load configuration from {}", path.display()))?,
        None => {
            info!("No config file given, using defaults");
            BookgenConfig::default()
        }
    };
    config.apply_env_overrides();
    Ok(config)
}
