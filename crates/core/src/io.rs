//! Sink adapters for transfers
//!
//! Chunked downloads hand each part to a [`WriteAt`] sink together with the
//! offset it belongs at. Callers of a backend usually only have a sequential
//! writer (stdout, a pipe, a socket), which [`SequentialWriter`] adapts.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Random-access async sink
#[async_trait]
pub trait WriteAt: Send {
    /// Write all of `buf` at byte `offset` of the destination
    async fn write_at(&mut self, buf: &[u8], offset: u64) -> std::io::Result<()>;

    async fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Presents a sequential writer as a [`WriteAt`] sink by ignoring offsets.
///
/// Every chunk is appended to the inner writer in the order `write_at` is
/// called; the offset argument is discarded.
///
/// # Invariant
///
/// This is only correct when chunks arrive in ascending, contiguous,
/// non-overlapping order, i.e. when the producing transfer runs with a
/// concurrency of exactly 1. A transfer that delivers parts concurrently must
/// not be given this adapter; it needs an offset-aware sink instead (one that
/// seeks, or buffers and reorders).
#[derive(Debug)]
pub struct SequentialWriter<W> {
    inner: W,
    written: u64,
}

impl<W> SequentialWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Total bytes appended so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W> WriteAt for SequentialWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_at(&mut self, buf: &[u8], offset: u64) -> std::io::Result<()> {
        if offset != self.written {
            tracing::trace!(
                offset = offset,
                position = self.written,
                "Ignoring offset for sequential sink"
            );
        }
        self.inner.write_all(buf).await?;
        self.written += buf.len() as u64;
        Ok(())
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }
}
