use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnricherError {
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

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Sheets API returned {status}: {message}")]
    SheetsApiError { status: u16, message: String },

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<EnricherError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Authentication,
    DataProcessing,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 1 處理失敗, 2 重試用盡, 3 設定或認證
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Medium => 2,
            Self::High => 1,
            Self::Critical => 3,
        }
    }
}

impl EnricherError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
        }
    }

    /// 可重試的錯誤：傳輸層失敗，以及 Sheets 的 429 / 5xx。
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(e) => !e.is_decode() && !e.is_builder(),
            Self::SheetsApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::SheetsApiError { .. } | Self::RetriesExhausted { .. } => {
                ErrorCategory::Network
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::AuthError { .. } => ErrorCategory::Authentication,
            Self::SerializationError(_) => ErrorCategory::DataProcessing,
            Self::CsvError(_) | Self::IoError(_) => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::RetriesExhausted { .. } => ErrorSeverity::Medium,
            Self::HttpError(_)
            | Self::SheetsApiError { .. }
            | Self::SerializationError(_)
            | Self::CsvError(_)
            | Self::IoError(_) => ErrorSeverity::High,
            _ => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check network connectivity and the spreadsheet service status, then rerun"
            }
            ErrorCategory::Configuration => {
                "Set GOOGLE_SHEET_ID and SCRAPIN_API_KEY, or check the config file"
            }
            ErrorCategory::Authentication => {
                "Delete token.json and rerun to go through the consent flow again"
            }
            ErrorCategory::DataProcessing => "Inspect the API response with --verbose",
            ErrorCategory::Storage => "Check file paths and permissions",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingConfigError { field } => format!("Missing required setting: {}", field),
            Self::RetriesExhausted {
                operation,
                attempts,
                ..
            } => format!("{} kept failing after {} attempts", operation, attempts),
            Self::SheetsApiError { status, .. } => {
                format!("The spreadsheet service rejected the request (HTTP {})", status)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EnricherError>;
