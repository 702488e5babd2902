//! Provider configuration.
//!
//! A `MemoryConfig` is built once at startup and handed to
//! `MemoryProvider::initialize`; nothing reads configuration from global
//! state afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::warn;

use crate::error::{MemoryError, MemoryResult};

/// Raw `initialize` options as string pairs.
pub type ProviderOptions = BTreeMap<String, String>;

/// Default SurrealDB endpoint for database-backed providers.
pub const DEFAULT_ENDPOINT: &str = "mem://";

const KNOWN_OPTIONS: [&str; 4] = ["base_path", "session_id", "quarantine_corrupt", "endpoint"];

/// Configuration for a memory provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Root directory for persisted scopes
    pub base_path: PathBuf,
    /// Session namespace this provider is bound to
    pub session_id: String,
    /// Move a corrupt namespace file aside and start empty instead of failing
    pub quarantine_corrupt: bool,
    /// Database endpoint (database-backed providers only)
    pub endpoint: String,
}

impl MemoryConfig {
    pub fn new(base_path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            session_id: session_id.into(),
            quarantine_corrupt: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_quarantine(mut self, quarantine: bool) -> Self {
        self.quarantine_corrupt = quarantine;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Build from `initialize` options.
    ///
    /// `base_path` and `session_id` are required. Unrecognised keys are
    /// ignored with a warning.
    pub fn from_options(options: &ProviderOptions) -> MemoryResult<Self> {
        for key in options.keys() {
            if !KNOWN_OPTIONS.contains(&key.as_str()) {
                warn!(option = %key, "Ignoring unknown memory provider option");
            }
        }

        let base_path = required(options, "base_path")?;
        let session_id = required(options, "session_id")?;

        let mut config = Self::new(base_path, session_id);
        if let Some(raw) = options.get("quarantine_corrupt") {
            config.quarantine_corrupt = parse_bool("quarantine_corrupt", raw)?;
        }
        if let Some(endpoint) = options.get("endpoint") {
            config.endpoint = endpoint.trim().to_string();
        }
        config.validate()?;
        Ok(config)
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - MEMSCOPE_BASE_PATH (required)
    /// - MEMSCOPE_SESSION_ID (required)
    /// - MEMSCOPE_QUARANTINE_CORRUPT (optional, default: "false")
    /// - MEMSCOPE_ENDPOINT (optional, default: "mem://")
    pub fn from_env() -> MemoryResult<Self> {
        let mut options = ProviderOptions::new();
        for (var, key) in [
            ("MEMSCOPE_BASE_PATH", "base_path"),
            ("MEMSCOPE_SESSION_ID", "session_id"),
            ("MEMSCOPE_QUARANTINE_CORRUPT", "quarantine_corrupt"),
            ("MEMSCOPE_ENDPOINT", "endpoint"),
        ] {
            if let Ok(value) = std::env::var(var) {
                options.insert(key.to_string(), value);
            }
        }
        Self::from_options(&options)
    }

    /// Reject blank required values.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(MemoryError::Configuration(
                "base_path must not be empty".to_string(),
            ));
        }
        if self.session_id.trim().is_empty() {
            return Err(MemoryError::Configuration(
                "session_id must not be empty".to_string(),
            ));
        }
        if self.endpoint.is_empty() {
            return Err(MemoryError::Configuration(
                "endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn required(options: &ProviderOptions, key: &str) -> MemoryResult<String> {
    match options.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        Some(_) => Err(MemoryError::Configuration(format!(
            "required option '{key}' is empty"
        ))),
        None => Err(MemoryError::Configuration(format!(
            "required option '{key}' is missing"
        ))),
    }
}

fn parse_bool(key: &str, raw: &str) -> MemoryResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(MemoryError::Configuration(format!(
            "option '{key}' expects a boolean, got '{other}'"
        ))),
    }
}
