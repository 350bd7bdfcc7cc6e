use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool talks to a SharePoint site or converts the files it moves.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as staging an upload or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport level failures reported by the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Raised when the site answers with a non-success status.
    #[error("SharePoint request failed with status {status}: {message}")]
    Remote { status: u16, message: String },

    /// Raised when a response is well-formed HTTP but not what the protocol promises.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors bubbled up from the delimited text reader or writer.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a cell cannot be coerced into the requested column type.
    #[error("invalid literal value '{value}' in column {column}")]
    InvalidLiteral { column: String, value: String },

    /// Raised when a remote path contains segments that cannot be addressed.
    #[error("invalid remote path '{0}'")]
    InvalidPath(String),

    /// Raised when the site configuration is incomplete or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when a directory name is rejected before contacting the site.
    #[error("invalid directory name '{0}'")]
    InvalidDirectoryName(String),

    /// Raised when no session could be established for the site.
    #[error("authentication against {site_url} failed: {source}")]
    Authentication {
        site_url: String,
        #[source]
        source: Box<ToolError>,
    },

    /// Raised when the site refuses or fails to create a folder.
    #[error("failed to create folder '{path}': {source}")]
    FolderCreation {
        path: String,
        #[source]
        source: Box<ToolError>,
    },

    /// Raised when a file cannot be downloaded.
    #[error("failed to download '{path}': {source}")]
    Download {
        path: String,
        #[source]
        source: Box<ToolError>,
    },

    /// Raised when downloaded content cannot be decoded as a table.
    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<ToolError>,
    },

    /// Raised when replacing or uploading a file fails.
    #[error("failed to upload '{path}': {source}")]
    Upload {
        path: String,
        #[source]
        source: Box<ToolError>,
    },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ToolError {
    /// Returns the HTTP status carried by a remote failure, looking through
    /// operation wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            ToolError::Remote { status, .. } => Some(*status),
            ToolError::Http(error) => error.status().map(|status| status.as_u16()),
            ToolError::Authentication { source, .. }
            | ToolError::FolderCreation { source, .. }
            | ToolError::Download { source, .. }
            | ToolError::Parse { source, .. }
            | ToolError::Upload { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Short machine-friendly name of the variant, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Io(_) => "io",
            ToolError::Json(_) => "json",
            ToolError::Http(_) => "http",
            ToolError::Remote { .. } => "remote",
            ToolError::InvalidResponse(_) => "invalid_response",
            ToolError::ExcelWrite(_) => "excel_write",
            ToolError::ExcelRead(_) => "excel_read",
            ToolError::Csv(_) => "csv",
            ToolError::InvalidWorkbook(_) => "invalid_workbook",
            ToolError::InvalidLiteral { .. } => "invalid_literal",
            ToolError::InvalidPath(_) => "invalid_path",
            ToolError::InvalidConfig(_) => "invalid_config",
            ToolError::InvalidDirectoryName(_) => "invalid_directory_name",
            ToolError::Authentication { .. } => "authentication",
            ToolError::FolderCreation { .. } => "folder_creation",
            ToolError::Download { .. } => "download",
            ToolError::Parse { .. } => "parse",
            ToolError::Upload { .. } => "upload",
            ToolError::MissingInput(_) => "missing_input",
            ToolError::Logging(_) => "logging",
        }
    }
}
