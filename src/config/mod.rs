//! Configuration module for plan2sql.
//!
//! Handles resolver settings, config file discovery and environment variables.

mod settings;

pub use settings::{expand_env_vars, ResolverSettings, Settings, SettingsError};
