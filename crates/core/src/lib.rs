//! skiff-core: Backend contract for the skiff copy tool
//!
//! This crate holds everything a storage backend shares with the others:
//! - Address resolution (`container/key` paths)
//! - The retry executor and its policy
//! - Configuration loading (file and environment)
//! - The `Backend` trait
//! - Sink adapters for chunked transfers
//!
//! It is independent of any storage SDK; `skiff-s3` implements the trait on
//! top of the AWS SDK.

pub mod config;
pub mod error;
pub mod io;
pub mod path;
pub mod retry;
pub mod traits;

pub use config::{Config, ConfigManager, S3Settings};
pub use error::{Error, Result};
pub use io::{SequentialWriter, WriteAt};
pub use path::{Address, resolve};
pub use retry::{BackoffStrategy, RetryBuilder, RetryConfig, retry_with_backoff};
pub use traits::Backend;
