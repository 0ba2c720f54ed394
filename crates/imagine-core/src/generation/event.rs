//! Events yielded by a provider while a generation request runs.

use std::fmt;

/// How a failed batch affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reported; the run continues with the next batch.
    Recoverable,
    /// Ends the whole run immediately.
    Fatal,
}

/// Encoding of the per-image payloads of a result event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Base64 encoded image bytes.
    Base64,
    /// A URL the image bytes can be fetched from.
    Url,
}

/// Classified cause of a failed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Authentication,
    ContentRejected,
    InsufficientBalance,
    RateLimited,
    ServerError,
    Network,
    Unknown,
}

impl FailureKind {
    pub fn severity(self) -> Severity {
        match self {
            FailureKind::Authentication
            | FailureKind::ContentRejected
            | FailureKind::InsufficientBalance => Severity::Fatal,
            FailureKind::RateLimited
            | FailureKind::ServerError
            | FailureKind::Network
            | FailureKind::Unknown => Severity::Recoverable,
        }
    }
}

/// Why a batch produced no images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub kind: FailureKind,
    /// User-facing explanation.
    pub message: String,
    /// Developer-oriented detail (status code, provider error body).
    pub detail: String,
}

impl BatchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.detail)
    }
}

impl std::error::Error for BatchFailure {}

/// One step of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Informational progress message.
    Log { message: String },
    /// A batch failed.
    Error {
        severity: Severity,
        message: String,
        detail: String,
    },
    /// A batch succeeded; `images` is never empty.
    Images {
        message: String,
        encoding: ImageEncoding,
        images: Vec<String>,
    },
}

impl GenerationEvent {
    pub fn log(message: impl Into<String>) -> Self {
        GenerationEvent::Log {
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GenerationEvent::Error {
                severity: Severity::Fatal,
                ..
            }
        )
    }
}

impl From<BatchFailure> for GenerationEvent {
    fn from(failure: BatchFailure) -> Self {
        GenerationEvent::Error {
            severity: failure.severity(),
            message: failure.message,
            detail: failure.detail,
        }
    }
}
