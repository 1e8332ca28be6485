//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed (an empty result set is still success for listings)
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - the store is damaged and automation should halt
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// Search ran but matched nothing, or the collection does not exist (code 3)
    NotFound = 3,

    /// A model could not be loaded or run (code 4)
    EmbeddingError = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Query does not fit the collection: dimension, metric or field (code 7)
    ContractError = 7,

    /// The vector store cannot be reached (code 8)
    StoreUnavailable = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// `Success` when there is at least one hit, `NotFound` otherwise.
    pub fn from_hits<T>(hits: &[T]) -> Self {
        if hits.is_empty() {
            ExitCode::NotFound
        } else {
            ExitCode::Success
        }
    }

    /// Maps an error status code to the exit code scripts should see.
    pub fn from_status_code(code: &str) -> Self {
        match code {
            "COLLECTION_NOT_FOUND" | "SOURCE_NOT_FOUND" => ExitCode::NotFound,

            "STORE_CORRUPTED" => ExitCode::BlockingError,

            "MODEL_UNAVAILABLE" | "INFERENCE_FAILED" | "EMPTY_EMBEDDING" | "INVALID_VECTOR"
            | "IMAGE_DECODE_ERROR" => ExitCode::EmbeddingError,

            "STORE_IO_ERROR" => ExitCode::IoError,

            "CONFIG_ERROR" | "UNKNOWN_MODEL" => ExitCode::ConfigError,

            "DIMENSION_MISMATCH" | "METRIC_MISMATCH" | "UNKNOWN_FIELD" | "INVALID_REQUEST"
            | "UNKNOWN_COLLECTION_SPACE" | "COLLECTION_EXISTS" => ExitCode::ContractError,

            "STORE_UNAVAILABLE" => ExitCode::StoreUnavailable,

            _ => ExitCode::GeneralError,
        }
    }

    /// Check if this exit code indicates a blocking error.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::NotFound => "Not found",
            ExitCode::EmbeddingError => "Embedding error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::ContractError => "Query does not match the collection",
            ExitCode::StoreUnavailable => "Vector store unavailable",
        }
    }
}
