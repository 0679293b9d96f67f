//! Error types for container and conversion operations.

use thiserror::Error;

/// Errors that can occur while reading, building or writing containers.
#[derive(Debug, Error)]
pub enum CaroError {
    /// XML parsing or serialization error.
    #[error("XML error: {0}")]
    Xml(String),

    /// ZIP archive error.
    #[error("Archive error: {0}")]
    Archive(String),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing required file, element or attribute.
    #[error("Missing required {kind}: {name}")]
    Missing { kind: &'static str, name: String },

    /// Invalid element, entry or value.
    #[error("Invalid {kind}: {message}")]
    Invalid { kind: &'static str, message: String },

    /// The destination already exists.
    #[error("Refusing to overwrite {0}")]
    Conflict(String),

    /// Operation not possible in the current state.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl CaroError {
    /// Create an XML error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Create an archive error.
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive(message.into())
    }

    /// Create a JSON error.
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json(message.into())
    }

    /// Create a missing file error.
    pub fn missing_file(name: impl Into<String>) -> Self {
        Self::Missing {
            kind: "file",
            name: name.into(),
        }
    }

    /// Create an invalid entry error.
    pub fn invalid_entry(message: impl Into<String>) -> Self {
        Self::Invalid {
            kind: "entry",
            message: message.into(),
        }
    }
}

impl From<zip::result::ZipError> for CaroError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Archive(e.to_string())
    }
}

impl From<serde_json::Error> for CaroError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<quick_xml::Error> for CaroError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}
