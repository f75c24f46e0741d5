//! # Response Rules Configuration
//!
//! The rules file is a JSON document loaded once at startup:
//!
//! ```json
//! {
//!   "request_field": "name",
//!   "response_field": "message",
//!   "rules": {
//!     "Greeter.SayHello": "hello %v",
//!     "Greeter.SayGoodbye": "good bye %v"
//!   }
//! }
//! ```
//!
//! Rule keys are either fully-qualified method names (`helloworld.Greeter.SayHello`) or
//! `Service.Method`. Any error here is fatal to startup.
use crate::resolver::{ResolveError, Resolver};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read rules file '{path}': '{source}'")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed rules file: '{0}'")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid response rule: '{0}'")]
    InvalidRule(#[from] ResolveError),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    /// Request field substituted into the templates.
    #[serde(default = "default_request_field")]
    pub request_field: String,
    /// Response field receiving the rendered text.
    #[serde(default = "default_response_field")]
    pub response_field: String,
    pub rules: BTreeMap<String, String>,
}

fn default_request_field() -> String {
    "name".to_string()
}

fn default_response_field() -> String {
    "message".to_string()
}

impl RulesConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json(&content)?;

        tracing::info!(
            path = %path.display(),
            rules = config.rules.len(),
            "loaded response rules"
        );

        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;

        if config.rules.is_empty() {
            tracing::warn!("rules file defines no rule, every call will be rejected");
        }

        Ok(config)
    }

    /// Validates every template and builds the call handler.
    pub fn into_resolver(self) -> Result<Resolver, ConfigError> {
        Ok(Resolver::from_config(&self)?)
    }
}
