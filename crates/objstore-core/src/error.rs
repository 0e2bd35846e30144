//! Error types for the tenancy layer.

/// Errors raised while validating partition keys or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The account ID is not a 12-digit numeric string.
    #[error("invalid account ID: {0} (must be a 12-digit numeric string)")]
    InvalidAccountId(String),

    /// The region name does not look like `xx-name-N`.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// A configuration value could not be interpreted.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for the tenancy layer.
pub type CoreResult<T> = Result<T, CoreError>;
