//! Error types for the generation pipeline.

use thiserror::Error;

use crate::llm::BackendKind;

/// Problems with the changeset itself. Reported before any backend is contacted.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("Not inside a git repository")]
    NotARepository,

    #[error("No staged changes found. Stage files with `git add` first.")]
    NoStagedChanges,

    #[error("All {count} staged file(s) are excluded by patterns or noise filters")]
    AllFilesExcluded { count: usize },

    #[error("Nothing substantive left to describe after reducing the diff (whitespace or comment-only changes)")]
    NoSubstantiveChanges,
}

/// Missing or syntactically unusable credentials for the selected backend.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No API key configured for {backend}. Set {env_var} or pass --api-key")]
    Missing {
        backend: BackendKind,
        env_var: &'static str,
    },

    #[error("The API key for {backend} looks malformed: {hint}")]
    Malformed {
        backend: BackendKind,
        hint: &'static str,
    },
}

/// Failures reported by (or while talking to) a text-generation backend.
///
/// Every variant is terminal for the invocation; nothing here is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{backend} rejected the API key: {detail}. Check the configured credential")]
    InvalidCredential { backend: BackendKind, detail: String },

    #[error("{backend} quota exhausted: {detail}. Check your plan or billing before retrying")]
    QuotaExceeded { backend: BackendKind, detail: String },

    #[error("{backend} does not know model '{model}'. Pick another with --model")]
    ModelNotFound { backend: BackendKind, model: String },

    #[error("{backend} rate limit hit: {detail}. Wait a moment and run again")]
    RateLimited { backend: BackendKind, detail: String },

    #[error("{backend} refused to generate content: {reason}")]
    ContentBlocked { backend: BackendKind, reason: String },

    #[error("{backend} request failed: {message}")]
    Unknown { backend: BackendKind, message: String },
}

impl BackendError {
    /// Stable category name, suitable for machine-readable output.
    pub fn category(&self) -> &'static str {
        match self {
            BackendError::InvalidCredential { .. } => "invalid-credential",
            BackendError::QuotaExceeded { .. } => "quota-exceeded",
            BackendError::ModelNotFound { .. } => "model-not-found",
            BackendError::RateLimited { .. } => "rate-limited",
            BackendError::ContentBlocked { .. } => "content-blocked",
            BackendError::Unknown { .. } => "unknown",
        }
    }

    pub fn backend(&self) -> BackendKind {
        match self {
            BackendError::InvalidCredential { backend, .. }
            | BackendError::QuotaExceeded { backend, .. }
            | BackendError::ModelNotFound { backend, .. }
            | BackendError::RateLimited { backend, .. }
            | BackendError::ContentBlocked { backend, .. }
            | BackendError::Unknown { backend, .. } => *backend,
        }
    }
}

/// The backend answered, but not with anything usable.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("The backend returned an empty response")]
    EmptyResponse,
}

/// Interactive selection could not complete.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Input closed before a candidate was chosen")]
    InputClosed,

    #[error("There are no candidates to choose from")]
    NoCandidates,

    #[error("Failed to read selection: {0}")]
    Io(#[from] std::io::Error),
}

/// Umbrella error for a whole generation run.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_quota_read_differently() {
        let rate = BackendError::RateLimited {
            backend: BackendKind::OpenAi,
            detail: "slow down".into(),
        };
        let quota = BackendError::QuotaExceeded {
            backend: BackendKind::OpenAi,
            detail: "slow down".into(),
        };
        assert_ne!(rate.to_string(), quota.to_string());
        assert_eq!(rate.category(), "rate-limited");
        assert_eq!(quota.category(), "quota-exceeded");
    }

    #[test]
    fn umbrella_error_is_transparent() {
        let err: Error = InputError::NoStagedChanges.into();
        assert_eq!(err.to_string(), InputError::NoStagedChanges.to_string());
    }

    #[test]
    fn backend_is_recoverable_from_any_variant() {
        let err = BackendError::ContentBlocked {
            backend: BackendKind::Gemini,
            reason: "SAFETY".into(),
        };
        assert_eq!(err.backend(), BackendKind::Gemini);
        assert!(err.to_string().contains("Gemini"));
    }
}
