//! Account context for the Cirrus stream reader.
//!
//! This crate owns everything shared between streams of one account:
//! - Token caches with single-flight refresh ([`cache`], [`credentials`])
//! - The shard directory, blacklist and failover resolver
//! - The HTTP client and the cloud JSON API
//! - Prometheus metrics

pub mod account;
pub mod api;
pub mod blacklist;
pub mod cache;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod http;
pub mod metrics;
pub mod resolver;

pub use account::{Account, AccountRegistry};
pub use api::{CloudApi, HttpCloudApi, ShardMap};
pub use blacklist::ShardBlacklist;
pub use cache::ExpiringValue;
pub use credentials::{Credentials, TokenSource};
pub use directory::ShardDirectory;
pub use error::{CloudError, CloudResult};
pub use resolver::{ShardResolver, ShardSource};
