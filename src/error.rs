//! Error taxonomy for a single module build.
//!
//! Every stage returns [`ModuleError`]. The plugin boundary flattens it into
//! the `ERROR: <message>` string protocol the orchestrator understands.

use std::path::PathBuf;
use thiserror::Error;

/// Prefix the orchestrator looks for to tell a failure from a command line.
pub const ERROR_MARKER: &str = "ERROR: ";

/// Message returned when no key material can be resolved.
pub const MISSING_KEY_MESSAGE: &str =
    "Keypath not specified and GenerateKey set to false. Cannot proceed";

pub type Result<T> = std::result::Result<T, ModuleError>;

#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module or recipe payload could not be decoded.
    #[error("{what}: {source}")]
    Deserialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("no {artifact} release {version} for architecture '{arch}'")]
    UnsupportedArchitecture {
        artifact: &'static str,
        arch: String,
        version: String,
    },

    #[error("Checksum mismatch for {}\n  Expected: {expected}\n  Actual:   {actual}", .path.display())]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Staging directory creation, move or extraction failed.
    #[error("{context}: {source:#}")]
    Filesystem {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{0}")]
    Configuration(String),

    /// Transport failure reported by the download collaborator.
    #[error("failed to download {url}: {source:#}")]
    Download {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module build cancelled")]
    Cancelled,
}

impl ModuleError {
    pub fn filesystem(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Filesystem {
            context: context.into(),
            source: source.into(),
        }
    }

    /// The key-material error raised when neither a generated nor a supplied key exists.
    pub fn missing_key() -> Self {
        Self::Configuration(MISSING_KEY_MESSAGE.to_string())
    }

    /// Render the boundary response: the error marker followed by the message.
    pub fn to_response(&self) -> String {
        format!("{}{}", ERROR_MARKER, self)
    }
}
