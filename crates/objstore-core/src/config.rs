//! Process-level configuration.
//!
//! Values come from environment variables so the same binary can be pointed
//! at different tenants without a config file.

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, AwsRegion};

/// Configuration shared by every objstore engine in a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjStoreConfig {
    /// Account used for requests that do not carry one.
    pub default_account_id: AccountId,
    /// Region used for requests that do not carry one.
    pub default_region: AwsRegion,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ObjStoreConfig {
    fn default() -> Self {
        Self {
            default_account_id: AccountId::default(),
            default_region: AwsRegion::default(),
            log_level: "info".to_owned(),
        }
    }
}

impl ObjStoreConfig {
    /// Load configuration from `DEFAULT_ACCOUNT_ID`, `DEFAULT_REGION` and
    /// `LOG_LEVEL`, keeping the default for anything unset or invalid.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("DEFAULT_ACCOUNT_ID") {
            match AccountId::new(v) {
                Ok(id) => config.default_account_id = id,
                Err(e) => tracing::warn!(error = %e, "ignoring DEFAULT_ACCOUNT_ID"),
            }
        }
        if let Some(v) = lookup("DEFAULT_REGION") {
            config.default_region = AwsRegion::new(v);
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_should_create_default_config() {
        let config = ObjStoreConfig::default();
        assert_eq!(config.default_account_id.as_str(), "000000000000");
        assert_eq!(config.default_region.as_str(), "us-east-1");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_should_override_from_lookup() {
        let config = ObjStoreConfig::from_lookup(lookup_from(&[
            ("DEFAULT_ACCOUNT_ID", "123456789012"),
            ("DEFAULT_REGION", "eu-central-1"),
            ("LOG_LEVEL", "debug"),
        ]));
        assert_eq!(config.default_account_id.as_str(), "123456789012");
        assert_eq!(config.default_region.as_str(), "eu-central-1");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_should_ignore_invalid_account_id() {
        let config = ObjStoreConfig::from_lookup(lookup_from(&[("DEFAULT_ACCOUNT_ID", "bogus")]));
        assert_eq!(config.default_account_id, AccountId::default());
    }

    #[test]
    fn test_should_serialize_to_camel_case() {
        let json = serde_json::to_string(&ObjStoreConfig::default()).expect("serialize");
        assert!(json.contains("defaultAccountId"));
        assert!(json.contains("\"000000000000\""));
    }
}
