//! Serializable operator configuration.
//!
//! ```
//! use stream_normalize::config::NormalizeConfig;
//! use std::time::Duration;
//!
//! let cfg = NormalizeConfig::from_json_str(r#"{ "window_ms": 250, "metrics": true }"#).unwrap();
//! assert_eq!(cfg.window(), Duration::from_millis(250));
//! assert!(cfg.metrics);
//! assert_eq!(cfg.scheduler_threads, None);
//! ```

use crate::error::NormalizeError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Settings for building a [`Normalize`](crate::Normalize) operator with
/// [`Normalize::from_config`](crate::Normalize::from_config).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Window length in milliseconds. Must be greater than zero.
    pub window_ms: u64,
    /// Worker threads for a dedicated scheduler. `None` shares the
    /// process-wide computation scheduler.
    pub scheduler_threads: Option<usize>,
    /// Attach a metrics recorder to the operator.
    pub metrics: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { window_ms: 1000, scheduler_threads: None, metrics: false }
    }
}

impl NormalizeConfig {
    #[inline]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// # Errors
    ///
    /// Returns an error for a zero window or a zero-sized worker pool.
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.window_ms == 0 {
            return Err(NormalizeError::InvalidWindow(Duration::ZERO));
        }
        if self.scheduler_threads == Some(0) {
            return Err(NormalizeError::InvalidConfig(
                "scheduler_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values are invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("parsing normalize config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are
    /// invalid.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading normalize config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in {}", path.display()))
    }
}
