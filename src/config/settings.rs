//! TOML-based configuration for plan2sql.
//!
//! Supports a config file (plan2sql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [resolver]
//! acceptance_threshold = 0.7
//! max_candidates = 5
//! set_compatible_operators = ["IN", "NOT IN", "=", "!=", "<>"]
//! index_path = "${PLAN2SQL_HOME}/value_index.json"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Semantic value resolution.
    pub resolver: ResolverSettings,
}

/// Semantic resolver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Confidence a non-first candidate must exceed to be accepted (0.0 to 1.0).
    pub acceptance_threshold: f64,

    /// Candidates fetched per lookup.
    pub max_candidates: usize,

    /// Operators whose right-hand side may be a list of values.
    pub set_compatible_operators: Vec<String>,

    /// Path to a saved value index (supports ${ENV_VAR} expansion).
    pub index_path: Option<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.7,
            max_candidates: 5,
            set_compatible_operators: vec![
                "IN".to_string(),
                "NOT IN".to_string(),
                "=".to_string(),
                "!=".to_string(),
                "<>".to_string(),
            ],
            index_path: None,
        }
    }
}

impl ResolverSettings {
    /// The index path with environment variables expanded.
    pub fn resolved_index_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.index_path
            .as_deref()
            .map(|path| expand_env_vars(path).map(PathBuf::from))
            .transpose()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `PLAN2SQL_CONFIG`
    /// 2. `./plan2sql.toml`
    /// 3. `~/.config/plan2sql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("PLAN2SQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("plan2sql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("plan2sql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let resolver = &self.resolver;
        if !(0.0..=1.0).contains(&resolver.acceptance_threshold) {
            return Err(SettingsError::InvalidConfig(format!(
                "resolver.acceptance_threshold must be between 0 and 1, got {}",
                resolver.acceptance_threshold
            )));
        }
        if resolver.max_candidates == 0 {
            return Err(SettingsError::InvalidConfig(
                "resolver.max_candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            // $VAR ends at non-alphanumeric/underscore
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
