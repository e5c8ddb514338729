use thiserror::Error;

#[derive(Error, Debug)]
pub enum LokiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Bad response {status} {reason}{}", format_body(.body))]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("Failed to parse response at `{path}`: {source}")]
    Deserialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected result type: expected {expected}, got {actual}")]
    UnexpectedResultType { expected: String, actual: String },

    #[error("Timestamp {0} cannot be expressed as i64 nanoseconds")]
    TimestampOutOfRange(String),

    #[error("Sample timestamp {0}s in the response is outside the supported date range")]
    SampleTimestampOutOfRange(i64),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },
}

fn format_body(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {}", body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad configuration, detected before any request is sent
    Config,
    /// Connection refused, timeout, broken body
    Transport,
    /// Non-success HTTP status
    Server,
    /// Response body that does not match the result model
    Parse,
}

impl LokiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LokiError::Transport(_) => ErrorCategory::Transport,
            LokiError::Status { .. } => ErrorCategory::Server,
            LokiError::Deserialization { .. }
            | LokiError::UnexpectedResultType { .. }
            | LokiError::SampleTimestampOutOfRange(_) => ErrorCategory::Parse,
            LokiError::Serialization(_)
            | LokiError::TimestampOutOfRange(_)
            | LokiError::Url(_)
            | LokiError::Io(_)
            | LokiError::ConfigError { .. }
            | LokiError::InvalidConfigValue { .. } => ErrorCategory::Config,
        }
    }

    /// True when the request gave up because the configured timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LokiError::Transport(e) if e.is_timeout())
    }

    /// HTTP status code of a `Status` error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LokiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Config => "Check the client configuration (URI, credentials, config file)",
            ErrorCategory::Transport => "Check that Loki is reachable or raise the read timeout",
            ErrorCategory::Server => "Inspect the query and the server response above",
            ErrorCategory::Parse => "The server answered with an unsupported payload; check the Loki version",
        }
    }

    /// Exit code used by the command line tool.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Config => 1,
            ErrorCategory::Transport | ErrorCategory::Server => 2,
            ErrorCategory::Parse => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, LokiError>;
