use thiserror::Error;

use crate::strategy::DetectionError;

/// Result type for S3 operations
pub type S3Result<T> = Result<T, S3Error>;

/// Boxed error carried by backend and uploader failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while configuring, validating or uploading
#[derive(Error, Debug)]
pub enum S3Error {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid image: {message}")]
    InvalidImage {
        message: String,
        #[source]
        source: Option<DetectionError>,
    },

    #[error("{message}")]
    Uploader {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: BoxError,
    },

    #[error("AWS region could not be found: {region}")]
    RegionNotFound { region: String },

    #[error("AWS credentials could not be resolved")]
    CredentialsNotFound {
        #[source]
        source: BoxError,
    },

    #[error("Unsupported MIME detection mode: {mode}")]
    UnsupportedDetectionMode { mode: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Coarse classification of an [`S3Error`].
///
/// Lets callers tell "my input was bad" apart from "the store failed"
/// without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Blank key, missing file, non-positive length, unusable stream
    Input,
    /// Disallowed extension or MIME type, or content sniffing failed
    InvalidImage,
    /// The put-object call itself failed before the store answered
    Uploader,
    /// Any other failure reported by the storage backend
    Backend,
    /// Region, credentials or detection mode could not be resolved
    Config,
}

impl S3Error {
    /// Create an input-contract error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an invalid image error
    pub fn invalid_image<S: Into<String>>(message: S) -> Self {
        Self::InvalidImage {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid image error caused by a failed detection
    pub fn detection_failed<S: Into<String>>(message: S, source: DetectionError) -> Self {
        Self::InvalidImage {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an uploader error from any error type
    pub fn uploader<S, E>(message: S, error: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        Self::Uploader {
            message: message.into(),
            source: error.into(),
        }
    }

    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            S3Error::InvalidInput { .. } => ErrorKind::Input,
            S3Error::InvalidImage { .. } => ErrorKind::InvalidImage,
            S3Error::Uploader { .. } => ErrorKind::Uploader,
            S3Error::Backend { .. } | S3Error::Io { .. } => ErrorKind::Backend,
            S3Error::RegionNotFound { .. }
            | S3Error::CredentialsNotFound { .. }
            | S3Error::UnsupportedDetectionMode { .. }
            | S3Error::InvalidConfig { .. } => ErrorKind::Config,
        }
    }
}
