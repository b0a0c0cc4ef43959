use thiserror::Error;

/// 載入行程來源時的錯誤，發生時整個流程必須停止
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Itinerary source '{path}' could not be read: {source}")]
    NotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Itinerary source is malformed: {message}")]
    Malformed { message: String },
}

impl LoadError {
    pub fn malformed(message: impl Into<String>) -> Self {
        LoadError::Malformed {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Itinerary {id} not found")]
pub struct NotFoundError {
    pub id: String,
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error while writing artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sheet name '{sheet}' is shared by tables '{first}' and '{second}'")]
    SheetNameCollision {
        sheet: String,
        first: String,
        second: String,
    },

    #[error("Table name '{name}' is produced more than once")]
    DuplicateTableName { name: String },
}

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Lookup,
    Export,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ViewerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ViewerError::Load(_) | ViewerError::SerializationError(_) => ErrorCategory::Input,
            ViewerError::NotFound(_) => ErrorCategory::Lookup,
            ViewerError::Export(_) => ErrorCategory::Export,
            ViewerError::ConfigError { .. }
            | ViewerError::ConfigValidationError { .. }
            | ViewerError::MissingConfigError { .. }
            | ViewerError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ViewerError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 查無行程不影響其他行程的瀏覽
            ErrorCategory::Lookup => ErrorSeverity::Medium,
            ErrorCategory::Export => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ViewerError::Load(LoadError::NotFound { path, .. }) => {
                format!("Cannot read itinerary file '{}'", path)
            }
            ViewerError::Load(LoadError::Malformed { message }) => {
                format!("The itinerary file is not valid: {}", message)
            }
            ViewerError::NotFound(e) => format!("Itinerary {} does not exist", e.id),
            ViewerError::Export(e) => format!("Export failed: {}", e),
            ViewerError::IoError(e) => format!("File system error: {}", e),
            ViewerError::SerializationError(e) => format!("JSON error: {}", e),
            ViewerError::ConfigError { message } => format!("Configuration problem: {}", message),
            ViewerError::ConfigValidationError { field, message } => {
                format!("Configuration field '{}' is invalid: {}", field, message)
            }
            ViewerError::MissingConfigError { field } => {
                format!("Configuration field '{}' is required", field)
            }
            ViewerError::InvalidConfigValueError { field, value, reason } => {
                format!("'{}' is not a valid value for '{}': {}", value, field, reason)
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ViewerError::Load(LoadError::NotFound { .. }) => {
                "Check the --source path or the [source] path entry in the config file"
            }
            ViewerError::Load(LoadError::Malformed { .. }) => {
                "The file must be a JSON array of itinerary objects, each with an itineraryId"
            }
            ViewerError::NotFound(_) => "Run the `list` command to see available itinerary ids",
            ViewerError::Export(ExportError::SheetNameCollision { .. })
            | ViewerError::Export(ExportError::DuplicateTableName { .. }) => {
                "Disable strict naming to accept overwritten tables"
            }
            ViewerError::Export(_) | ViewerError::IoError(_) => {
                "Check that the output directory exists and is writable"
            }
            ViewerError::SerializationError(_) => "Check the JSON syntax of the input file",
            ViewerError::ConfigError { .. }
            | ViewerError::ConfigValidationError { .. }
            | ViewerError::MissingConfigError { .. }
            | ViewerError::InvalidConfigValueError { .. } => {
                "Review the TOML configuration and command line flags"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
