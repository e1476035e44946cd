use thiserror::Error;

/// A convenience `Result` alias using [`MarketlensError`].
pub type MarketlensResult<T> = Result<T, MarketlensError>;

/// Top-level error type for MarketLens.
///
/// Provider-side variants (`Http`, `Timeout`, `Connection`, `MalformedResponse`) describe a
/// single backend attempt; [`MarketlensError::is_transient`] decides whether that attempt is
/// worth repeating. Everything the gateway gives up on is wrapped in
/// [`MarketlensError::ProviderUnavailable`] with the last failure kept as its source.
#[derive(Error, Debug)]
pub enum MarketlensError {
    /// The backend answered with a non-success HTTP status.
    #[error("HTTP error {status}: {message}")]
    Http {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The backend call exceeded its own timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The backend could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend answered but the body did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Every configured backend failed for this turn.
    #[error("Provider unavailable: {reason}")]
    ProviderUnavailable {
        /// Short description of why the gateway gave up.
        reason: String,
        /// The last backend failure, kept for diagnostics.
        #[source]
        source: Box<MarketlensError>,
    },

    /// The model requested a tool that is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool handler failed (bad arguments, missing data, unsupported operation).
    #[error("Tool error: {0}")]
    Tool(String),

    /// The model's end-of-turn text could not be parsed into an analysis.
    #[error("Invalid final answer: {0}")]
    InvalidFinalAnswer(String),

    /// A report or step could not be written or read.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Chart or document rendering failed.
    #[error("Rendering error: {0}")]
    Rendering(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarketlensError {
    /// Whether a failed backend attempt may succeed if repeated.
    ///
    /// Timeouts, connection failures and 5xx responses are transient. Client errors
    /// and malformed bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            MarketlensError::Timeout(_) | MarketlensError::Connection(_) => true,
            MarketlensError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Wraps `cause` as a [`MarketlensError::ProviderUnavailable`].
    pub fn provider_unavailable(reason: impl Into<String>, cause: MarketlensError) -> Self {
        MarketlensError::ProviderUnavailable {
            reason: reason.into(),
            source: Box::new(cause),
        }
    }
}
