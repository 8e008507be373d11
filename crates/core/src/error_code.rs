//! Flat, machine-stable item error taxonomy.
//!
//! [`FlowError`] is the one error type that crosses the flow boundary: hooks,
//! input materialization and `run_item` all report failures with it. Errors
//! from foreign sources that carry no taxonomy code become [`ErrorCode::Unknown`].

define_text_enum! {
    /// Item error code persisted on `job_items.error_code`.
    ErrorCode {
        None = "NONE",
        NavigationError = "NAVIGATION_ERROR",
        Timeout = "TIMEOUT",
        InvalidInput = "INVALID_INPUT",
        RetryExhausted = "RETRY_EXHAUSTED",
        Deduped = "DEDUPED",
        Unknown = "UNKNOWN",
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::None
    }
}

/// A failure reported by flow code, tagged with its taxonomy code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct FlowError {
    pub code: ErrorCode,
    pub message: String,
}

impl FlowError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn navigation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NavigationError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    /// Wrap any error that does not declare a taxonomy code.
    pub fn unknown(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

/// Schema errors while materializing a flow's typed input.
impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_input(format!("schema_error: {err}"))
    }
}
