use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("Invalid query parameters: {message}")]
    InvalidQuery { message: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Upstream API returned {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Storage,
    Network,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::InvalidIdentifier { .. }
            | Self::MalformedPayload { .. }
            | Self::InvalidQuery { .. }
            | Self::NotFound { .. }
            | Self::SerializationError(_)
            | Self::ValidationError { .. } => ErrorCategory::Input,
            Self::DatabaseError(_) | Self::IoError(_) | Self::ZipError(_) | Self::CsvError(_) => {
                ErrorCategory::Storage
            }
            Self::ApiError(_) | Self::UpstreamStatus { .. } => ErrorCategory::Network,
            Self::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Storage => match self {
                // 連線池逾時可重試
                Self::DatabaseError(sqlx::Error::PoolTimedOut) => ErrorSeverity::Medium,
                _ => ErrorSeverity::Critical,
            },
            ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => {
                "Check DATABASE_URL and that the database file is writable; run `check` to test the connection"
            }
            Self::ApiError(_) | Self::UpstreamStatus { .. } => {
                "Make sure the API server is running (`serve`) and the client api_base_url points at it"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => {
                "Review the TOML configuration file and environment overrides"
            }
            Self::InvalidIdentifier { .. } => {
                "Table and column names may only contain letters, digits and underscores"
            }
            Self::MalformedPayload { .. } | Self::SerializationError(_) => {
                "Input must be a JSON array of objects"
            }
            Self::InvalidQuery { .. } => "Use `limit=<number>` and `dry_run=true|false`",
            Self::NotFound { .. } => "Verify the identifier; use `tables` to list what is loaded",
            Self::IoError(_) => "Verify the file path exists and permissions are correct",
            Self::ZipError(_) | Self::CsvError(_) => "Check free disk space and the report output path",
            Self::ProcessingError { .. } | Self::ValidationError { .. } => {
                "Inspect the input data; re-run with --verbose for details"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::DatabaseError(e) => format!("Database operation failed: {}", e),
            Self::IoError(e) => format!("File operation failed: {}", e),
            Self::NotFound { resource } => format!("{} could not be found", resource),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_category() {
        let err = EtlError::validation("no records");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = EtlError::DatabaseError(sqlx::Error::PoolTimedOut);
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(err.severity(), ErrorSeverity::Medium);

        let err = EtlError::DatabaseError(sqlx::Error::RowNotFound);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_not_found_message() {
        let err = EtlError::not_found("Sundae");
        assert_eq!(err.to_string(), "Sundae not found");
        assert_eq!(err.user_friendly_message(), "Sundae could not be found");
    }
}
