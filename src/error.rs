use thiserror::Error;

/// Convenience result type for library operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Errors raised by the profiling, field graph, rendering, and RDBMS layers.
///
/// Inference problems that the profiler can recover from are logged instead of
/// being returned (see [`crate::format::CsvFormat`]); everything here reaches
/// the caller.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// The sample has no consistent delimited structure; the caller must retry
    /// with an explicit format.
    #[error("could not detect format: {0}")]
    FormatDetection(String),

    /// Guessed header and type lists disagree in length.
    #[error("schema mismatch: {headers} header(s) but {types} guessed type(s)")]
    SchemaMismatch { headers: usize, types: usize },

    /// Malformed or oversized field tree.
    #[error("invalid field tree: {0}")]
    FieldGraph(String),

    /// An operation is missing one of the arguments its operator declares.
    #[error("operation '{operation}' on field '{field}' is missing argument '{argument}'")]
    MissingOperationArgument {
        field: String,
        operation: String,
        argument: String,
    },

    #[error("template error: {0}")]
    Template(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("statement failed: {0}")]
    Statement(String),

    #[error("Destination {path} already exists.")]
    UploadConflict { path: String },

    #[error("Copy to {path} failed: {cause}")]
    UploadIo { path: String, cause: String },

    #[error("Invalid design type {0}")]
    InvalidDesignType(String),

    #[error("invalid form: {0}")]
    InvalidForm(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for IndexerError {
    fn from(err: rusqlite::Error) -> Self {
        IndexerError::Statement(err.to_string())
    }
}
