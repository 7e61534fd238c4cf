use thiserror::Error;

/// Error types shared by fetchers, extractors, the session and the exporter
#[derive(Error, Debug)]
pub enum ScrapeError {
    // Network errors
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP request failed: {url} - {status}")]
    HttpStatus { url: String, status: u16 },

    // Rendered fetch errors
    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Browser support not enabled")]
    BrowserUnavailable,

    // Parsing errors
    #[error("Parse error: {message}")]
    Parse { message: String },

    // Input errors
    #[error("{message}")]
    InvalidInput { message: String },

    // Export errors
    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    // Session errors
    #[error("An extraction is already in progress")]
    SessionBusy,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ScrapeError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Create a render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render { message: message.into() }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }

    /// Create an input validation error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    /// Create an export error
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export { message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Transport or status failure of a plain fetch
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::HttpStatus { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network { .. } | Self::HttpStatus { .. } => "network",
            Self::Render { .. } | Self::BrowserUnavailable => "render",
            Self::Parse { .. } => "parse",
            Self::InvalidInput { .. } => "input",
            Self::Export { .. } | Self::UnsupportedFormat { .. } => "export",
            Self::SessionBusy => "session",
            Self::Configuration { .. } => "configuration",
            Self::Io(_) | Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for the library
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        match (err.status(), err.url()) {
            (Some(status), Some(url)) => Self::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            },
            _ => Self::network(err.to_string()),
        }
    }
}

impl From<url::ParseError> for ScrapeError {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_input(format!("Invalid URL: {}", err))
    }
}

impl From<csv::Error> for ScrapeError {
    fn from(err: csv::Error) -> Self {
        Self::export(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        Self::export(err.to_string())
    }
}

impl From<zip::result::ZipError> for ScrapeError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::export(err.to_string())
    }
}
