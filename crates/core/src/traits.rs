//! Backend trait shared by every storage backend
//!
//! A copy tool pairs a source and a destination backend and drives both
//! through this trait. Each backend owns its concrete client type, so no
//! handle ever needs to be downcast.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Uniform contract for connecting to, listing, reading from and writing to a
/// storage service
///
/// Paths use the `<container>[/<key-segment>]*` syntax. Implementations must
/// resolve the path before any network call and must run every network
/// operation under the shared retry policy.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Reusable connection handle produced by [`Backend::get_client`]
    type Client: Send + Sync;

    /// Build a client and verify the service behind `path` is reachable
    async fn get_client(&self, path: &str) -> Result<Self::Client>;

    /// List item keys under `path`, relative to it
    async fn list_files(&self, client: &Self::Client, path: &str) -> Result<Vec<String>>;

    /// Stream the item at `path` into `sink`
    ///
    /// A retried download starts over and writes the item again from its
    /// first byte, so `sink` must tolerate being rewritten.
    async fn download(
        &self,
        client: &Self::Client,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()>;

    /// Store the contents of `stream` at `dest_path`
    ///
    /// When `dest_path` names only a container, the item is named after the
    /// file name of `source_hint`. A retried upload reads `stream` from its
    /// current position; rewinding it between attempts is up to the caller.
    async fn upload(
        &self,
        client: &Self::Client,
        dest_path: &str,
        source_hint: &str,
        stream: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<()>;
}
