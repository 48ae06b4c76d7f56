//! skiff-s3: S3 storage backend for skiff
//!
//! This crate implements the `Backend` trait from skiff-core on top of
//! aws-sdk-s3. It is the only crate that directly depends on the AWS SDK.

pub mod api;
pub mod backend;
pub mod client;
pub mod download;
pub mod endpoint;
pub mod upload;

pub use api::{ObjectApi, SdkApi};
pub use backend::S3Backend;
pub use client::S3Client;
pub use download::RangedDownload;
