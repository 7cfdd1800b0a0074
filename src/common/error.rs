//! Error handling primitives shared across the core.
//!
//! Every failure is a precondition failure detected before any arithmetic
//! runs, so none of these are retryable.

use std::path::PathBuf;

use thiserror::Error;

/// Stable error codes exposed to callers that only want to switch on a number.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// Artifact is missing fields or has inconsistent shapes.
    ArtifactFormat = 1,
    /// A consumed feature has no scaling entry.
    MissingTransform = 2,
    /// Category label is not part of the registry.
    UnknownCategory = 3,
    /// Scaling entry with zero or non-finite standard deviation.
    DegenerateTransform = 4,
    /// Artifact file could not be read or written.
    ArtifactIo = 5,
    /// Invalid runtime configuration.
    Config = 6,
    /// Prediction log rejected a record.
    Sink = 7,
    /// Caller supplied a missing or non-finite input.
    InvalidInput = 8,
}

/// Canonical error type for the core.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("malformed artifact for model `{model}`: {reason}")]
    ArtifactFormat { model: String, reason: String },

    #[error("no scaling entry for feature `{feature}`")]
    MissingTransform { feature: String },

    #[error("unknown category `{category}`")]
    UnknownCategory { category: String },

    #[error("degenerate scaling for feature `{feature}` (std = {std})")]
    DegenerateTransform { feature: String, std: f64 },

    #[error("artifact io error at {}: {source}", path.display())]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration `{field}`: {message}")]
    Config { field: String, message: String },

    #[error("prediction sink error: {message}")]
    Sink { message: String },

    #[error("invalid input `{feature}`: {reason}")]
    InvalidInput { feature: String, reason: String },
}

/// Result alias used throughout the crate.
pub type ServeResult<T> = Result<T, ServeError>;

impl ServeError {
    /// Artifact shape helper.
    pub fn artifact(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArtifactFormat {
            model: model.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_transform(feature: impl Into<String>) -> Self {
        Self::MissingTransform {
            feature: feature.into(),
        }
    }

    pub fn unknown_category(category: impl Into<String>) -> Self {
        Self::UnknownCategory {
            category: category.into(),
        }
    }

    pub fn degenerate(feature: impl Into<String>, std: f64) -> Self {
        Self::DegenerateTransform {
            feature: feature.into(),
            std,
        }
    }

    /// IO helper that keeps the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ArtifactIo {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_input(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Machine parsable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServeError::ArtifactFormat { .. } => ErrorCode::ArtifactFormat,
            ServeError::MissingTransform { .. } => ErrorCode::MissingTransform,
            ServeError::UnknownCategory { .. } => ErrorCode::UnknownCategory,
            ServeError::DegenerateTransform { .. } => ErrorCode::DegenerateTransform,
            ServeError::ArtifactIo { .. } => ErrorCode::ArtifactIo,
            ServeError::Config { .. } => ErrorCode::Config,
            ServeError::Sink { .. } => ErrorCode::Sink,
            ServeError::InvalidInput { .. } => ErrorCode::InvalidInput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::Ok as u32, 0);
        assert_eq!(ErrorCode::ArtifactFormat as u32, 1);
        assert_eq!(ErrorCode::MissingTransform as u32, 2);
        assert_eq!(ErrorCode::UnknownCategory as u32, 3);
        assert_eq!(ErrorCode::DegenerateTransform as u32, 4);
        assert_eq!(ErrorCode::ArtifactIo as u32, 5);
        assert_eq!(ErrorCode::Config as u32, 6);
        assert_eq!(ErrorCode::Sink as u32, 7);
        assert_eq!(ErrorCode::InvalidInput as u32, 8);
    }

    #[test]
    fn errors_map_to_codes() {
        assert_eq!(
            ServeError::unknown_category("juguetes").code(),
            ErrorCode::UnknownCategory
        );
        assert_eq!(
            ServeError::degenerate("price", 0.0).code(),
            ErrorCode::DegenerateTransform
        );
        let err = ServeError::io(
            "models/x.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), ErrorCode::ArtifactIo);
        assert!(err.to_string().contains("models/x.json"));
    }

    #[test]
    fn messages_name_the_offender() {
        let err = ServeError::missing_transform("rating");
        assert_eq!(err.to_string(), "no scaling entry for feature `rating`");
    }
}
