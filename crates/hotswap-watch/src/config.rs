//! Watch configuration

use crate::error::ConfigError;
use hotswap_artifact::NodePath;
use serde::{Deserialize, Serialize};

/// Artifact source selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Apply node data
    #[default]
    Payload,
    /// Run the supplied providers
    Chain,
}

/// Configuration of one watch
///
/// ```toml
/// path = "/hotswap/classes"
/// mode = "chain"
/// thread_name = "classes-watch"
/// join_on_stop = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Subtree to watch
    pub path: NodePath,
    /// Artifact source
    #[serde(default)]
    pub mode: ModeKind,
    /// Name of the dispatch thread (generated when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    /// Wait for the dispatch thread in `stop()`
    #[serde(default = "default_join_on_stop")]
    pub join_on_stop: bool,
}

fn default_join_on_stop() -> bool {
    true
}

impl WatchConfig {
    /// Payload-mode config for `path`
    #[inline]
    #[must_use]
    pub fn new(path: NodePath) -> Self {
        Self {
            path,
            mode: ModeKind::Payload,
            thread_name: None,
            join_on_stop: true,
        }
    }

    /// Set artifact source
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: ModeKind) -> Self {
        self.mode = mode;
        self
    }

    /// Set dispatch thread name
    #[inline]
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Set whether `stop()` joins the dispatch thread
    #[inline]
    #[must_use]
    pub fn with_join_on_stop(mut self, join: bool) -> Self {
        self.join_on_stop = join;
        self
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for bad syntax, unknown modes or an
    /// invalid path
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Serialize`] if rendering fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}
