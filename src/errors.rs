/*!
 * Error types for the dataset translator.
 *
 * Provider and store failures are transport-level; `TranslationError` is the
 * discriminated outcome of a single oracle call and is what the retry policy
 * branches on. `ItemFailure` is the terminal per-item outcome reported by the
 * orchestrator.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting on the provider side
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Build the error matching an HTTP status returned by a provider
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }

    /// Whether the oracle rejected the request as malformed or asked us to slow down.
    ///
    /// JSON-mode providers answer 400 when the model produced output that does not
    /// satisfy the requested format, which is noise from a non-deterministic oracle
    /// rather than a fault on our side.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded(_) | Self::ApiError { status_code: 400 | 422 | 429, .. }
        )
    }
}

/// Reasons an oracle reply is rejected before it reaches the progress store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("response is not valid JSON: {0}")]
    NotJson(String),

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("missing required key '{0}'")]
    MissingKey(String),

    #[error("unexpected key '{0}'")]
    UnexpectedKey(String),

    #[error("value for '{0}' is empty")]
    EmptyValue(String),

    #[error("value for '{field}' should be {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: i64, actual: i64 },

    /// The oracle echoed part of the prompt instead of translating
    #[error("response contains prompt text: '{0}'")]
    PromptLeakage(String),

    #[error("response contains un-substituted template token '{0}'")]
    UnsubstitutedPlaceholder(String),
}

/// Kind of a failed oracle call, used to decide whether it is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transient,
    Unclassified,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Transient => write!(f, "transient"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Outcome of a single failed translation attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// The oracle answered but the answer was rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The oracle signalled a malformed request or a rate limit
    #[error("Transient provider error: {0}")]
    Transient(ProviderError),

    /// Anything else; surfaced without retrying
    #[error("Unclassified error: {0}")]
    Unclassified(String),
}

impl TranslationError {
    /// Classify a provider failure
    pub fn from_provider(error: ProviderError) -> Self {
        if error.is_transient() {
            Self::Transient(error)
        } else {
            Self::Unclassified(error.to_string())
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Unclassified(_) => ErrorKind::Unclassified,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Unclassified
    }
}

impl From<ProviderError> for TranslationError {
    fn from(error: ProviderError) -> Self {
        Self::from_provider(error)
    }
}

/// Terminal failure of one work item
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemFailure {
    /// Every attempt failed with a retryable error
    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: TranslationError },

    /// A non-retryable error aborted the item
    #[error("aborted on attempt {attempt}: {error}")]
    Unclassified { attempt: u32, error: TranslationError },

    /// The result was valid but could not be persisted
    #[error("failed to persist result: {0}")]
    Store(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
