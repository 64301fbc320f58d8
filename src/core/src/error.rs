use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Bundle, name, or destination checks that run before any work.
    Validation,
    /// Reading and decoding `config.json` / `runtime.json`.
    Parse,
    /// Mapping the OCI spec onto the ACI manifest schema.
    Translate,
    /// Working directory, rootfs copy, and manifest file handling.
    Io,
    /// Layout verification and archive writing.
    Archive,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Parse => write!(f, "parse"),
            Self::Translate => write!(f, "translate"),
            Self::Io => write!(f, "io"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// oci2aci error types
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Bundle directory is not usable
    #[error("Invalid OCI bundle: {0}")]
    InvalidBundle(String),

    /// Identifier failed AC identifier / AC name syntax
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Target path does not carry the image extension
    #[error("Extension must be {expected} (given {given})")]
    InvalidExtension { expected: String, given: String },

    /// Spec file could not be read
    #[error("Failed to read {}: {source}", file.display())]
    SpecRead {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Spec file is not valid JSON for the expected schema
    #[error("Failed to parse {}: {source}", file.display())]
    SpecParse {
        file: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// OCI value cannot be expressed in the manifest
    #[error("Translation error: {0}")]
    TranslateError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Filesystem operation failed on a specific path
    #[error("Filesystem error at {}: {message}", path.display())]
    FsError { path: PathBuf, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Manifest does not satisfy the image manifest schema
    #[error("Image manifest validation failed: {0}")]
    InvalidManifest(String),

    /// Manifest is valid but written against a superseded schema version
    #[error("ACVersion too old. Found version {found}, expected {expected}")]
    OldVersion { found: String, expected: String },

    /// Exploded layout is malformed
    #[error("Layout failed validation: {0}")]
    LayoutError(String),

    /// Archive could not be produced
    #[error("Archive error: {0}")]
    ArchiveError(String),
}

impl ConvertError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidBundle(_) | Self::InvalidName { .. } | Self::InvalidExtension { .. } => {
                Stage::Validation
            }
            Self::SpecRead { .. } | Self::SpecParse { .. } => Stage::Parse,
            Self::TranslateError(_) => Stage::Translate,
            Self::IoError(_) | Self::FsError { .. } | Self::SerializationError(_) => Stage::Io,
            Self::InvalidManifest(_)
            | Self::OldVersion { .. }
            | Self::LayoutError(_)
            | Self::ArchiveError(_) => Stage::Archive,
        }
    }

    /// Shorthand for a [`ConvertError::FsError`].
    pub fn fs(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::FsError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::SerializationError(err.to_string())
    }
}

/// Result type alias for oci2aci operations
pub type Result<T> = std::result::Result<T, ConvertError>;
