use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::validator::DocumentValidator;

/// Every failure a conversion pass can report.
///
/// File, parse and version failures are detected before any tree is walked and
/// short-circuit the pass. `Conversion` aborts the whole document and keeps the
/// source document so a validation pass can produce a friendlier message.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to read file {path:?}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document: {0}")]
    Parse(String),

    #[error("Selected file is not a valid Swagger 2.0 schema (found version {})", found.as_deref().unwrap_or("none"))]
    SchemaVersion { found: Option<String> },

    #[error("{label}: {title}")]
    Validation { label: String, title: String },

    #[error("Failed to convert document: {message}")]
    Conversion {
        message: String,
        document: Option<Box<Value>>,
    },

    #[error("Failed to serialize document: {0}")]
    Serialization(String),
}

impl ConversionError {
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
            document: None,
        }
    }

    /// Attach the source document to a `Conversion` failure.
    pub fn with_document(self, source: &Value) -> Self {
        match self {
            Self::Conversion { message, .. } => Self::Conversion {
                message,
                document: Some(Box::new(source.clone())),
            },
            other => other,
        }
    }

    /// Short title shown to the user next to the failure detail.
    pub fn title(&self) -> &'static str {
        match self {
            Self::FileAccess { .. } => "Error opening file",
            Self::Parse(_) | Self::SchemaVersion { .. } => "Error parsing Swagger Schema",
            Self::Validation { .. } => "Error validating Swagger Schema",
            Self::Conversion { .. } | Self::Serialization(_) => "Error converting model",
        }
    }

    /// Re-run validation over the document attached to a `Conversion` failure.
    ///
    /// When the validator reports something, its first message replaces the
    /// original error; otherwise the error is returned untouched.
    pub fn refine(self, validator: &dyn DocumentValidator) -> Self {
        if let Self::Conversion {
            document: Some(document),
            ..
        } = &self
        {
            if let Some(first) = validator.validate(document).into_iter().next() {
                return Self::Validation {
                    label: first.label,
                    title: first.title,
                };
            }
        }
        self
    }
}

impl From<serde_json::Error> for ConversionError {
    fn from(error: serde_json::Error) -> Self {
        Self::conversion(error.to_string())
    }
}
