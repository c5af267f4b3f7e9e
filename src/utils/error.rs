use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Market data error for {ticker}: {message}")]
    MarketDataError { ticker: String, message: String },

    #[error("No data found for ticker {ticker}")]
    NoDataError { ticker: String },

    #[error("Failed to parse {source_name}: {message}")]
    ParseError {
        source_name: String,
        message: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Failed to distribute report via {channel}: {message}")]
    DistributionError { channel: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Storage,
    Distribution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code used by the binaries. `Low` is a warning and exits 0.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl TrackerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackerError::HttpError(_) | TrackerError::MarketDataError { .. } => {
                ErrorCategory::Network
            }
            TrackerError::ZipError(_)
            | TrackerError::IoError(_)
            | TrackerError::StorageError { .. } => ErrorCategory::Storage,
            TrackerError::ConfigError { .. }
            | TrackerError::InvalidConfigValueError { .. }
            | TrackerError::MissingConfigError { .. } => ErrorCategory::Configuration,
            TrackerError::DistributionError { .. } => ErrorCategory::Distribution,
            TrackerError::CsvError(_)
            | TrackerError::SerializationError(_)
            | TrackerError::NoDataError { .. }
            | TrackerError::ParseError { .. }
            | TrackerError::ProcessingError { .. }
            | TrackerError::ValidationError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrackerError::NoDataError { .. } => ErrorSeverity::Low,
            TrackerError::HttpError(_)
            | TrackerError::MarketDataError { .. }
            | TrackerError::DistributionError { .. } => ErrorSeverity::Medium,
            TrackerError::ZipError(_) | TrackerError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check network connectivity and that the market data endpoints are reachable, then retry"
            }
            ErrorCategory::Storage => {
                "Check that the output location exists and is writable, and that there is free disk space"
            }
            ErrorCategory::Configuration => {
                "Review the command line arguments, configuration file and environment variables"
            }
            ErrorCategory::Distribution => {
                "Verify the webhook URL is valid and the channel still accepts messages"
            }
            ErrorCategory::Data => {
                "The upstream data may have changed shape; check the ticker symbols and inspect the raw response"
            }
        }
    }

    /// Exit code for a run that failed with this error. Never 0, even for
    /// `Low` severity.
    pub fn exit_code(&self) -> i32 {
        self.severity().exit_code().max(1)
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TrackerError::HttpError(e) if e.is_timeout() => {
                "The request timed out while contacting a remote service".to_string()
            }
            TrackerError::HttpError(_) => "Could not reach a remote service".to_string(),
            TrackerError::NoDataError { ticker } => format!("No data found for ticker {}", ticker),
            TrackerError::MarketDataError { ticker, .. } => {
                format!("Failed to fetch market data for {}", ticker)
            }
            TrackerError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            TrackerError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
