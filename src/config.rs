//! Application configuration and file filtering rules.
//!
//! Configuration is stored in TOML. Every section and key is optional:
//!
//! ```toml
//! [llm]
//! api_key = "sk-..."            # or OPENAI_API_KEY
//! model_name = "gpt-3.5-turbo"  # per-file analysis
//! organization_model = "gpt-4o" # holistic folder schema
//!
//! [organizer]
//! naming_scheme = "snake_case"
//! max_folder_depth = 3
//! preserve_projects = true
//! project_markers = [".git", "package.json", "Cargo.toml"]
//!
//! [scanner]
//! max_file_size_mb = 10.0
//! exclude_patterns = ["**/*.tmp"]
//!
//! [scanner.filters]
//! enable_hidden_files = false
//!
//! [scanner.filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! extensions = ["bak"]
//! regex = []
//!
//! [scanner.filters.include]
//! patterns = []
//! ```

use crate::naming::NamingScheme;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur during configuration loading and filter compilation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    #[error("IO error reading configuration: {0}")]
    IoError(String),
    #[error("No API key configured; set OPENAI_API_KEY or [llm].api_key")]
    MissingApiKey,
    #[error("Invalid exclusion file {}: {reason}", .path.display())]
    InvalidExclusionFile { path: PathBuf, reason: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub organizer: OrganizerConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

/// Oracle connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model for per-file analysis.
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Model for the holistic folder schema.
    #[serde(default = "default_organization_model")]
    pub organization_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout; unset means wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model_name() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_organization_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            model_name: default_model_name(),
            organization_model: default_organization_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: None,
        }
    }
}

/// Planner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizerConfig {
    /// Scheme for created folders.
    #[serde(default)]
    pub naming_scheme: NamingScheme,
    #[serde(default)]
    pub tags_naming_scheme: NamingScheme,
    #[serde(default = "default_categories_scheme")]
    pub categories_naming_scheme: NamingScheme,
    /// Maximum hierarchy depth, counting the base directory as one level.
    #[serde(default = "default_max_folder_depth")]
    pub max_folder_depth: usize,
    #[serde(default = "default_true")]
    pub preserve_projects: bool,
    #[serde(default = "default_project_markers")]
    pub project_markers: Vec<String>,
    /// README candidates, in lookup order.
    #[serde(default = "default_readme_names")]
    pub readme_names: Vec<String>,
    /// Directory for operation batches; defaults to `~/.aitidy/logs`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Plan with the holistic schema instead of per-file folder suggestions.
    #[serde(default = "default_true")]
    pub intelligent: bool,
}

fn default_categories_scheme() -> NamingScheme {
    NamingScheme::PascalCase
}

fn default_max_folder_depth() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_project_markers() -> Vec<String> {
    [".git", "package.json", "pyproject.toml", "Cargo.toml", "Makefile"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_readme_names() -> Vec<String> {
    ["README.md", "README.rst", "README.txt", "README", "readme.md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            naming_scheme: NamingScheme::SnakeCase,
            tags_naming_scheme: NamingScheme::SnakeCase,
            categories_naming_scheme: default_categories_scheme(),
            max_folder_depth: default_max_folder_depth(),
            preserve_projects: true,
            project_markers: default_project_markers(),
            readme_names: default_readme_names(),
            log_dir: None,
            intelligent: true,
        }
    }
}

impl OrganizerConfig {
    /// Directory that holds operation batches.
    pub fn resolved_log_dir(&self) -> PathBuf {
        if let Some(dir) = &self.log_dir {
            return dir.clone();
        }
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        home.join(".aitidy").join("logs")
    }
}

/// Scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: f64,
    /// Extensions whose content is read and sent to the oracle.
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
    /// Glob patterns, matched against paths relative to the scanned directory.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub filters: FilterRules,
}

fn default_max_file_size_mb() -> f64 {
    10.0
}

fn default_text_extensions() -> Vec<String> {
    ["txt", "md", "py", "js", "html", "css", "json", "yaml", "yml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            text_extensions: default_text_extensions(),
            exclude_patterns: Vec::new(),
            filters: FilterRules::default(),
        }
    }
}

/// Exclusion and inclusion rules applied to every scanned file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist; overrides exclude rules.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    #[serde(default)]
    pub filenames: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Contents of an `--exclude-file`.
#[derive(Debug, Deserialize)]
struct ExclusionFile {
    #[serde(default)]
    exclusions: Vec<String>,
}

impl AppConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if provided
    /// 2. `.aitidy.toml` in the current directory
    /// 3. `~/.config/aitidy/config.toml`
    /// 4. defaults
    ///
    /// Environment overrides (`OPENAI_API_KEY`, `AITIDY_MODEL`) are applied last.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_file_or_default(config_path)?;
        config.apply_env();
        Ok(config)
    }

    fn load_file_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".aitidy.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("aitidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY")
            && !key.trim().is_empty()
        {
            self.llm.api_key = key;
        }
        if let Ok(model) = std::env::var("AITIDY_MODEL")
            && !model.trim().is_empty()
        {
            self.llm.model_name = model;
        }
    }

    /// Fails unless an API key is available.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        let key = self.llm.api_key.trim();
        if key.is_empty() {
            Err(ConfigError::MissingApiKey)
        } else {
            Ok(key)
        }
    }
}

/// Reads glob exclusions from a TOML file of the form `exclusions = ["...", ...]`.
pub fn load_exclusion_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content =
        fs::read_to_string(path).map_err(|e| ConfigError::InvalidExclusionFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let parsed: ExclusionFile =
        toml::from_str(&content).map_err(|e| ConfigError::InvalidExclusionFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(parsed.exclusions)
}

/// Compiled filter structures for efficient file matching.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    /// Compiles `rules` plus any extra glob exclusions (CLI, exclusion file, config).
    pub fn new(rules: &FilterRules, extra_exclusions: &[String]) -> Result<Self, ConfigError> {
        let mut exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        exclude_patterns.extend(compile_globs(extra_exclusions)?);
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check whether a file should be organized.
    ///
    /// `relative_path` is the path relative to the scanned directory.
    /// Include patterns win; then hidden files, exact names, extensions,
    /// globs, and regexes exclude.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    /// Whether a directory should be descended into.
    pub fn should_descend(&self, relative_dir: &Path) -> bool {
        let name = relative_dir
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if !self.enable_hidden_files && name.starts_with('.') {
            return false;
        }
        !self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_dir))
    }
}
