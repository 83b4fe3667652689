use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// How an organizer reacts when a compensating action fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackPolicy {
    /// The first failing compensation supersedes the original signal and the
    /// rest of the rollback pass is abandoned.
    #[default]
    Abort,
    /// Every compensation is attempted. Failures are collected into
    /// [`StepError::CompensationFailed`](crate::StepError::CompensationFailed).
    BestEffort,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse engine configuration")]
    TomlParse(#[from] toml::de::Error),

    #[error("failed to read engine configuration at '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Engine settings shared by the organizers of one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    rollback_policy: RollbackPolicy,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    stepwise: Option<EngineConfig>,
    package: Option<MetadataHolder>,
    workspace: Option<MetadataHolder>,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataHolder {
    metadata: Option<Metadata>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    stepwise: Option<EngineConfig>,
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rollback_policy(&self) -> RollbackPolicy {
        self.rollback_policy
    }

    #[must_use]
    pub fn with_rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.rollback_policy = policy;
        self
    }

    /// Parse engine settings from a TOML document.
    ///
    /// Settings are read from a top-level `[stepwise]` table, or from
    /// `[package.metadata.stepwise]` / `[workspace.metadata.stepwise]` when
    /// the document is a Cargo manifest. A document without any of them
    /// yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TomlParse`] if the document is not valid TOML or
    /// a settings table contains unknown keys or values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let document: ConfigDocument = toml::from_str(content)?;

        let from_metadata = |holder: Option<MetadataHolder>| {
            holder
                .and_then(|holder| holder.metadata)
                .and_then(|metadata| metadata.stepwise)
        };

        Ok(document
            .stepwise
            .or_else(|| from_metadata(document.package))
            .or_else(|| from_metadata(document.workspace))
            .unwrap_or_default())
    }

    /// Read and parse engine settings from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::TomlParse`] if it cannot be parsed.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
