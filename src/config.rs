use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

/// Documented bounds for the worker pool. The default sits inside 5..=10.
pub const DEFAULT_WORKERS: usize = 8;
pub const MAX_WORKERS: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extension: String,
    pub ignore_patterns: Vec<String>,
    pub review: ReviewConfig,
    pub llm: LLMConfig,
    pub requirements: RequirementsConfig,
    pub structure: StructureConfig,
    pub layers: LayersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub workers: usize,
    /// Validator names, run in this order for every file.
    pub validators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LLMProvider {
    OpenAI,
    Ollama,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementsConfig {
    /// Manifest file names looked up in the review root.
    pub manifests: Vec<String>,
    pub forbidden: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub max_depth: usize,
    pub required_directories: Vec<String>,
    pub detect_import_cycles: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayersConfig {
    pub rules: Vec<LayerRule>,
}

/// A directory whose path contains one of `keywords` belongs to `layer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRule {
    pub layer: String,
    pub keywords: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extension: ".py".to_string(),
            ignore_patterns: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
                "venv".to_string(),
                ".venv".to_string(),
                "__pycache__".to_string(),
                "build".to_string(),
                "dist".to_string(),
            ],
            review: ReviewConfig::default(),
            llm: LLMConfig::default(),
            requirements: RequirementsConfig::default(),
            structure: StructureConfig::default(),
            layers: LayersConfig::default(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            validators: vec![
                "layer_matcher".to_string(),
                "logging".to_string(),
                "print_statements".to_string(),
            ],
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            api_key: None,
            base_url: None,
            model: "gpt-4".to_string(),
            max_tokens: 4000,
            temperature: 0.1,
            timeout_seconds: 300,
        }
    }
}

impl Default for RequirementsConfig {
    fn default() -> Self {
        Self {
            manifests: vec![
                "requirements.txt".to_string(),
                "pyproject.toml".to_string(),
                "Cargo.toml".to_string(),
                "package.json".to_string(),
            ],
            forbidden: Vec::new(),
        }
    }
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            required_directories: Vec::new(),
            detect_import_cycles: true,
        }
    }
}

impl Default for LayersConfig {
    fn default() -> Self {
        let rule = |layer: &str, keywords: &[&str]| LayerRule {
            layer: layer.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };
        Self {
            rules: vec![
                rule("presentation", &["api", "routes", "routers", "handlers", "views", "controllers", "endpoints", "web"]),
                rule("domain", &["services", "domain", "usecases", "use_cases", "core", "logic"]),
                rule("data_access", &["models", "repositories", "repository", "db", "database", "dao", "schemas", "migrations", "alembic"]),
                rule("infrastructure", &["config", "settings", "utils", "middleware", "clients", "adapters"]),
            ],
        }
    }
}

impl LayersConfig {
    pub fn layer_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.layer.clone()).collect()
    }
}

impl Config {
    /// Get the default config file path (~/.layer-review.toml)
    pub fn default_config_path() -> crate::Result<PathBuf> {
        let home_dir = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| anyhow!("Could not determine home directory"))?;
        Ok(PathBuf::from(home_dir).join(".layer-review.toml"))
    }

    /// Load config from the default location, falling back to defaults if the file doesn't exist
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::default_config_path()?;

        let mut config = if config_path.exists() {
            tracing::info!(path = %config_path.display(), "loading configuration");
            Self::from_file(&config_path)?
        } else {
            tracing::debug!(path = %config_path.display(), "no configuration file, using defaults");
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific file path
    pub fn from_file(path: &PathBuf) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file
    pub fn to_file(&self, path: &PathBuf) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // API keys not set in the file come from the provider's usual variable.
    fn apply_env(&mut self) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = match self.llm.provider {
                LLMProvider::OpenAI => env::var("OPENAI_API_KEY").ok(),
                LLMProvider::Anthropic => env::var("ANTHROPIC_API_KEY").ok(),
                LLMProvider::Ollama => None,
            };
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.review.workers == 0 || self.review.workers > MAX_WORKERS {
            bail!(
                "review.workers must be between 1 and {} (got {})",
                MAX_WORKERS,
                self.review.workers
            );
        }
        if self.extension.trim_start_matches('.').is_empty() {
            bail!("extension must not be empty");
        }
        Ok(())
    }

    /// Create a config file with all available options documented
    pub fn create_documented_config() -> String {
        r#"# layer-review configuration file

# Extension of the source files to review
extension = ".py"

# Directory or file names skipped while collecting files ("*.ext" globs allowed)
ignore_patterns = [".git", "node_modules", "target", "venv", ".venv", "__pycache__", "build", "dist"]

[review]
# Number of files reviewed concurrently (1-64, 5-10 recommended).
# This also bounds concurrent calls to the LLM provider.
workers = 8

# Validators run on every classified file, in this order.
# Available: layer_matcher, logging, review, print_statements
validators = ["layer_matcher", "logging", "print_statements"]

[llm]
# LLM Provider: "OpenAI", "Ollama", or "Anthropic"
provider = "OpenAI"

# API key for the provider (can also be set via environment variables)
# OpenAI: OPENAI_API_KEY
# Anthropic: ANTHROPIC_API_KEY
# api_key = "your-api-key-here"

# Base URL (mainly for Ollama local instances)
# base_url = "http://localhost:11434"

model = "gpt-4"
max_tokens = 4000
temperature = 0.1

# Request timeout in seconds; bounds how long one file can wait on the provider
timeout_seconds = 300

[requirements]
# Dependency manifests inspected in the project root
manifests = ["requirements.txt", "pyproject.toml", "Cargo.toml", "package.json"]

# Dependencies that must not be declared
forbidden = []

[structure]
max_depth = 6
required_directories = []
detect_import_cycles = true

# Keyword rules used to classify directories when the LLM is skipped.
[[layers.rules]]
layer = "presentation"
keywords = ["api", "routes", "routers", "handlers", "views", "controllers", "endpoints", "web"]

[[layers.rules]]
layer = "domain"
keywords = ["services", "domain", "usecases", "use_cases", "core", "logic"]

[[layers.rules]]
layer = "data_access"
keywords = ["models", "repositories", "repository", "db", "database", "dao", "schemas", "migrations", "alembic"]

[[layers.rules]]
layer = "infrastructure"
keywords = ["config", "settings", "utils", "middleware", "clients", "adapters"]
"#
        .to_string()
    }
}
