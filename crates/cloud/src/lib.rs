//! Object storage for generated media.
//!
//! The workflow only ever deletes objects it no longer needs; uploads are
//! done by the generation service, which returns public URLs.

pub mod config;
pub mod error;
pub mod s3;
pub mod storage;

pub use config::StorageConfig;
pub use error::StorageError;
pub use s3::S3Storage;
pub use storage::{key_for_url, StorageProvider};
