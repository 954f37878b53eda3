use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::adapters::llm::ModelConfig;
use crate::core::{DiffOptions, PromptConfig, PullRequestRef, ReviewError};
use crate::providers::{ProviderConfig, Service};

pub const STASH_TOKEN_VAR: &str = "STASH_HTTP_ACCESS_TOKEN";
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// User defaults, overridden by explicit command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: Option<String>,
    pub project_key: Option<String>,

    #[serde(default = "default_llm_type")]
    pub llm_type: String,

    pub llm_url: Option<String>,
    pub openai_base_url: Option<String>,

    #[serde(default = "default_context_lines")]
    pub nb_context_lines: u32,

    #[serde(default)]
    pub exclude_file_types: Vec<String>,

    #[serde(default = "default_service")]
    pub service: Service,

    #[serde(default)]
    pub exhaustive_analysis: bool,

    #[serde(default)]
    pub interactive: bool,

    #[serde(default)]
    pub show_prompt: bool,

    pub system_prompt: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            project_key: None,
            llm_type: default_llm_type(),
            llm_url: None,
            openai_base_url: None,
            nb_context_lines: default_context_lines(),
            exclude_file_types: Vec::new(),
            service: default_service(),
            exhaustive_analysis: false,
            interactive: false,
            show_prompt: false,
            system_prompt: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Flags given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub project_key: Option<String>,
    pub llm_type: Option<String>,
    pub llm_url: Option<String>,
    pub nb_context_lines: Option<u32>,
    pub exclude_file_types: Option<Vec<String>>,
    pub service: Option<Service>,
    pub exhaustive_analysis: bool,
    pub interactive: bool,
    pub show_prompt: bool,
}

/// Secrets read from the environment once at startup.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub stash_token: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            stash_token: std::env::var(STASH_TOKEN_VAR).ok(),
            openai_api_key: std::env::var(OPENAI_KEY_VAR).ok(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut candidates = vec![PathBuf::from(".prometh.yml"), PathBuf::from(".prometh.yaml")];
        if let Some(home_dir) = dirs::home_dir() {
            candidates.push(home_dir.join(".prometh.yml"));
            // legacy defaults file
            candidates.push(home_dir.join(".promethrc.json"));
        }

        for path in candidates {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        };
        Ok(config)
    }

    pub fn merge_with_cli(&mut self, cli: CliOverrides) {
        if let Some(base_url) = cli.base_url {
            self.base_url = Some(base_url);
        }
        if let Some(project_key) = cli.project_key {
            self.project_key = Some(project_key);
        }
        if let Some(llm_type) = cli.llm_type {
            self.llm_type = llm_type;
        }
        if let Some(llm_url) = cli.llm_url {
            self.llm_url = Some(llm_url);
        }
        if let Some(lines) = cli.nb_context_lines {
            self.nb_context_lines = lines;
        }
        if let Some(exclude) = cli.exclude_file_types {
            self.exclude_file_types = exclude;
        }
        if let Some(service) = cli.service {
            self.service = service;
        }
        self.exhaustive_analysis |= cli.exhaustive_analysis;
        self.interactive |= cli.interactive;
        self.show_prompt |= cli.show_prompt;
    }

    /// Checked before any network call is made.
    pub fn validate(&self) -> Result<(), ReviewError> {
        if matches!(self.service, Service::Stash | Service::Bitbucket) {
            if self.base_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                return Err(ReviewError::Configuration("Base URL is not set".to_string()));
            }
            if self.project_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err(ReviewError::Configuration("Project key is not set".to_string()));
            }
        }
        if self.llm_type.trim().is_empty() {
            return Err(ReviewError::Configuration("LLM type is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ReviewError::Configuration(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        for entry in &self.exclude_file_types {
            if entry.trim().is_empty() {
                return Err(ReviewError::Configuration(
                    "empty entry in exclude_file_types".to_string(),
                ));
            }
            glob::Pattern::new(entry.trim()).map_err(|e| {
                ReviewError::Configuration(format!("invalid exclude pattern {entry:?}: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn pull_request_ref(&self, repo_slug: &str, id: u64) -> PullRequestRef {
        PullRequestRef {
            repo_slug: repo_slug.to_string(),
            id,
            project_key: self.project_key.clone().unwrap_or_default(),
        }
    }

    pub fn provider_config(&self, credentials: &Credentials) -> ProviderConfig {
        ProviderConfig {
            base_url: self.base_url.clone(),
            token: credentials.stash_token.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn model_config(&self, credentials: &Credentials) -> ModelConfig {
        ModelConfig {
            model_name: self.llm_type.clone(),
            api_key: credentials.openai_api_key.clone(),
            hosted_base_url: self.openai_base_url.clone(),
            self_hosted_url: self.llm_url.clone(),
            temperature: self.temperature,
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn prompt_config(&self) -> PromptConfig {
        let mut prompt_config = PromptConfig::default();
        if let Some(system_prompt) = &self.system_prompt {
            prompt_config.system_prompt = system_prompt.clone();
        }
        prompt_config
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions::new(
            self.nb_context_lines,
            self.exhaustive_analysis,
            self.exclude_file_types
                .iter()
                .map(|e| e.trim().to_string())
                .collect(),
        )
    }
}

fn default_llm_type() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_context_lines() -> u32 {
    10
}

fn default_service() -> Service {
    Service::Stash
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    300
}
