//! Core domain types for the Cirrus segmented stream reader.
//!
//! This crate defines the data model shared by the other crates:
//! - Shard categories and endpoints
//! - Logical files, physical parts and part-local segments
//! - Inclusive byte ranges
//! - Application configuration

pub mod config;
pub mod error;
pub mod file;
pub mod range;
pub mod shard;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use file::{LogicalFile, PartSegment, PartSource, PhysicalPart};
pub use range::ByteRange;
pub use shard::{ShardCategory, ShardEndpoint};
