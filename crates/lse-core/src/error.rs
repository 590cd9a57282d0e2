//! Unified error type for the estimator core.
//!
//! Inference procedures are total and never fail; the only `Err` results come
//! from structural problems found while linking a model and from malformed
//! configuration. [`crate::model::LinkError`] and TOML errors convert into
//! [`LseError`] so callers can use a single `?` chain. Problems met during a
//! refresh (such as a line with too many compensators to enumerate) are
//! reported as diagnostics instead.
//!
//! # Example
//!
//! ```ignore
//! use lse_core::{EstimatorConfig, LseResult, NetworkModel};
//!
//! fn prepare(model: &mut NetworkModel, toml_text: &str) -> LseResult<()> {
//!     let config = EstimatorConfig::from_toml_str(toml_text)?;
//!     model.apply_config(&config);
//!     model.link()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::model::LinkError;

/// Error type shared by the estimator crates.
#[derive(Error, Debug)]
pub enum LseError {
    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broken references or inconsistent structure in the network model
    #[error("Model error: {0}")]
    Model(#[from] LinkError),
}

/// Convenience type alias for Results using [`LseError`].
pub type LseResult<T> = Result<T, LseError>;

impl From<toml::de::Error> for LseError {
    fn from(err: toml::de::Error) -> Self {
        LseError::Parse(err.to_string())
    }
}
