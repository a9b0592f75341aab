use thiserror::Error;

/// Main error type for the HyperBench system
#[derive(Error, Debug)]
pub enum HbError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Malformed hyperparameter space or experiment configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No table row matches the requested assignment.
    #[error("Lookup error: no row matches assignment {assignment}")]
    Lookup { assignment: String },

    #[error("Optimization error: {0}")]
    Optimization(#[from] OptimizationError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Dataset loading errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("Invalid data format in {path}: {message}")]
    InvalidFormat { path: String, message: String },

    #[error("Data parsing error in {path} at line {line}: {message}")]
    ParseError {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },
}

/// Strategy-level failures
#[derive(Error, Debug)]
pub enum OptimizationError {
    #[error("{strategy} exhausted its budget of {budget} evaluations without a valid fitness")]
    BudgetExhausted { strategy: String, budget: usize },

    #[error("{strategy} cannot search an empty space")]
    EmptySpace { strategy: String },
}

/// Failures of a repeat's worker, surfaced to the orchestrator
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {message}")]
    Spawn { message: String },

    #[error("Repeat {repeat} failed: {message}")]
    Failed { repeat: usize, message: String },

    #[error("Repeat {repeat} panicked or was cancelled")]
    Panicked { repeat: usize },

    #[error("Malformed worker reply for repeat {repeat}: {message}")]
    Protocol { repeat: usize, message: String },
}

/// Result type alias for HyperBench operations
pub type HbResult<T> = Result<T, HbError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HbError::Config(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::HbError::Internal(format!($($arg)*))
    };
}
