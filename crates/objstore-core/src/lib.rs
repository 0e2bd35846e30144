//! Tenancy primitives shared by the objstore engines.
//!
//! State in objstore is partitioned by account and region, the same way the
//! hosted service isolates tenants. This crate provides the partition key
//! types, the [`AccountRegionStore`] that hands out one state instance per
//! partition, and the process-level [`ObjStoreConfig`].

mod config;
mod error;
mod state;
mod types;

pub use config::ObjStoreConfig;
pub use error::{CoreError, CoreResult};
pub use state::AccountRegionStore;
pub use types::{AccountId, AwsRegion};
