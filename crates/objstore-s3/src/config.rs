//! S3-specific configuration.
//!
//! Provides [`S3Config`] for tuning the storage engine. Values are loaded from
//! environment variables using the same names as the hosted emulator.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default spill threshold of an object value, in bytes.
pub const DEFAULT_MAX_MEMORY_OBJECT_SIZE: usize = 524_288;

/// Default minimum size of every multipart part except the last, in bytes.
pub const DEFAULT_MIN_PART_SIZE: u64 = 5_242_880;

/// S3 engine configuration.
///
/// # Examples
///
/// ```
/// use objstore_s3::config::S3Config;
///
/// let config = S3Config::default();
/// assert_eq!(config.max_memory_object_size, 524_288);
/// assert_eq!(config.min_part_size, 5_242_880);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    /// Bytes an object value keeps in memory before spilling to a temporary file.
    #[builder(default = DEFAULT_MAX_MEMORY_OBJECT_SIZE)]
    pub max_memory_object_size: usize,

    /// Minimum size of a multipart part that is not the final one.
    #[builder(default = DEFAULT_MIN_PART_SIZE)]
    pub min_part_size: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            max_memory_object_size: DEFAULT_MAX_MEMORY_OBJECT_SIZE,
            min_part_size: DEFAULT_MIN_PART_SIZE,
        }
    }
}

impl S3Config {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `S3_MAX_MEMORY_OBJECT_SIZE` | `524288` |
    /// | `S3_MIN_PART_SIZE` | `5242880` |
    ///
    /// # Examples
    ///
    /// ```
    /// use objstore_s3::config::S3Config;
    ///
    /// let config = S3Config::from_env();
    /// assert!(config.min_part_size > 0);
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("S3_MAX_MEMORY_OBJECT_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_memory_object_size = n;
            }
        }
        if let Some(v) = lookup("S3_MIN_PART_SIZE") {
            if let Ok(n) = v.parse::<u64>() {
                config.min_part_size = n;
            }
        }

        config
    }
}
