use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Unknown document format: {0}")]
    #[diagnostic(code(planicare::unknown_format))]
    UnknownDocumentFormat(String),

    #[error("Header metadata missing: {0}")]
    #[diagnostic(code(planicare::header_metadata))]
    HeaderMetadataMissing(String),

    #[error("Malformed segment: {0}")]
    #[diagnostic(code(planicare::malformed_segment))]
    MalformedSegment(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(planicare::google_calendar))]
    Calendar(String),

    #[error("Rate limit exceeded: {0}")]
    #[diagnostic(code(planicare::rate_limit))]
    RateLimit(String),

    #[error("Duplicate event: {0}")]
    #[diagnostic(code(planicare::duplicate_event))]
    DuplicateEvent(String),

    #[error("Event already deleted: {0}")]
    #[diagnostic(code(planicare::already_deleted))]
    AlreadyDeleted(String),

    #[error("Sync lock error: {0}")]
    #[diagnostic(code(planicare::lock))]
    Lock(String),

    #[error("Backup error: {0}")]
    #[diagnostic(code(planicare::backup))]
    Backup(String),

    #[error("PDF extraction error: {0}")]
    #[diagnostic(code(planicare::pdf))]
    Pdf(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(planicare::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(planicare::config))]
    Config(String),

    #[error("Redis error: {0}")]
    #[diagnostic(code(planicare::redis))]
    Redis(String),

    #[error(transparent)]
    #[diagnostic(code(planicare::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(planicare::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(planicare::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Redis(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type SyncResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create Google Calendar errors
pub fn calendar_error(message: &str) -> Error {
    Error::Calendar(message.to_string())
}

/// Helper to create backup errors
pub fn backup_error(message: &str) -> Error {
    Error::Backup(message.to_string())
}

impl Error {
    /// True when the error should be retried with backoff
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit(_))
    }
}
