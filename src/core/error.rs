/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// `configure` was called with a backend name outside the supported set
    #[error("'{0}' is not a supported backend. Supported backends: {supported}", supported = crate::backends::SUPPORTED_BACKENDS.join(", "))]
    UnsupportedBackend(String),

    /// Source/Token creation was asked for a source type we cannot vault
    #[error("'{0}' is not a supported source type. Supported source types: {supported}", supported = crate::backends::SUPPORTED_SOURCE_TYPES.join(", "))]
    UnsupportedSourceType(String),

    /// Validation errors for request parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// A backend call reported failure mid-sequence in a multi-step flow
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// No backend has been configured yet
    #[error("No payment backend is configured; call configure() first")]
    NotConfigured,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failures surfaced by the native backend itself (declines, processor errors)
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn operation_failed(msg: impl Into<String>) -> Self {
        AppError::OperationFailed(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::Gateway(msg.into())
    }
}
