//! Crate-wide error type.
//!
//! Only misconfiguration and malformed input surface as errors. Numeric hazards
//! (zero timestep, zero mass, zero-length ray direction) are substituted in place
//! and logged, and "no result" conditions are plain `Option`s or empty `Vec`s.

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A construction parameter that would make the index or an emitter misbehave.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Mesh topology that does not match its vertex list.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Scenario file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Scenario file could not be parsed.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }
}
