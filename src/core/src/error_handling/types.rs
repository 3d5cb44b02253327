use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures of the store gateway. None of them are retried locally.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ConnectionFailed(String),
    WriteFailed(String),
    ReadFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    UnsupportedPredicate(String),
    UnsupportedField(String),
    InvalidValue { predicate: String, value: String },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::UnsupportedPredicate(name) => {
                write!(f, "Unsupported predicate: {}", name)
            }
            FilterError::UnsupportedField(name) => write!(f, "Unsupported field: {}", name),
            FilterError::InvalidValue { predicate, value } => {
                write!(f, "Invalid value '{}' for predicate '{}'", value, predicate)
            }
        }
    }
}

impl std::error::Error for FilterError {}

#[derive(Debug)]
pub enum IngestError {
    Parse {
        host: String,
        date: String,
        time: String,
        reason: String,
    },
    Io(std::io::Error),
    Json(serde_json::Error),
    Storage(StorageError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Parse {
                host,
                date,
                time,
                reason,
            } => write!(
                f,
                "Unparseable timestamp '{} {}' for host {}: {}",
                date, time, host, reason
            ),
            IngestError::Io(e) => write!(f, "Ingestion IO error: {}", e),
            IngestError::Json(e) => write!(f, "Ingestion input is not valid JSON: {}", e),
            IngestError::Storage(e) => write!(f, "Ingestion storage error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err)
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Json(err)
    }
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        IngestError::Storage(err)
    }
}

#[derive(Debug)]
pub enum RenderError {
    Io(std::io::Error),
    Format(fmt::Error),
    EmptySeries(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Io(e) => write!(f, "Render IO error: {}", e),
            RenderError::Format(e) => write!(f, "Render format error: {}", e),
            RenderError::EmptySeries(title) => write!(f, "Nothing to plot for '{}'", title),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<fmt::Error> for RenderError {
    fn from(err: fmt::Error) -> Self {
        RenderError::Format(err)
    }
}

#[derive(Debug)]
pub enum ReportError {
    Storage(StorageError),
    Render(RenderError),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Storage(e) => write!(f, "Report storage error: {}", e),
            ReportError::Render(e) => write!(f, "Report render error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<StorageError> for ReportError {
    fn from(err: StorageError) -> Self {
        ReportError::Storage(err)
    }
}

impl From<RenderError> for ReportError {
    fn from(err: RenderError) -> Self {
        ReportError::Render(err)
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug, PartialEq)]
pub enum QueryError {
    Filter(FilterError),
    Storage(StorageError),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Filter(e) => write!(f, "Query rejected: {}", e),
            QueryError::Storage(e) => write!(f, "Query failed: {}", e),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<FilterError> for QueryError {
    fn from(err: FilterError) -> Self {
        QueryError::Filter(err)
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        QueryError::Storage(err)
    }
}
