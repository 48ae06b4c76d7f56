//! Ranged object download
//!
//! The object is split into `part_size` byte ranges; each range is fetched
//! with its own ranged GET and handed to a [`WriteAt`] sink together with its
//! offset. Parts complete in whatever order the service answers, so with a
//! concurrency above 1 the sink must honor offsets.

use std::ops::RangeInclusive;
use std::sync::Arc;

use futures::StreamExt;
use skiff_core::{Error, Result, WriteAt};

use crate::api::ObjectApi;

/// Default size of a single ranged GET
pub const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Downloads one object in ranged parts
pub struct RangedDownload {
    api: Arc<dyn ObjectApi>,
    part_size: u64,
    concurrency: usize,
}

impl RangedDownload {
    /// A download fetching one part at a time
    pub fn new(api: Arc<dyn ObjectApi>, part_size: u64) -> Self {
        Self {
            api,
            part_size: part_size.max(1),
            concurrency: 1,
        }
    }

    /// Number of parts in flight at once
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch `bucket/key` into `sink`, returning the number of bytes written
    pub async fn run<S>(&self, bucket: &str, key: &str, sink: &mut S) -> Result<u64>
    where
        S: WriteAt + ?Sized,
    {
        let meta = self.api.head_object(bucket, key).await?;
        let etag = meta.etag.as_deref();

        tracing::debug!(
            bucket = bucket,
            key = key,
            size = meta.size,
            parts = meta.size.div_ceil(self.part_size),
            concurrency = self.concurrency,
            "Starting ranged download"
        );

        let mut parts = futures::stream::iter(part_ranges(meta.size, self.part_size))
            .map(|range| async move {
                let offset = *range.start();
                let expected = range.end() - range.start() + 1;
                let data = self
                    .api
                    .get_range(bucket, key, range, etag.map(str::to_string))
                    .await?;

                if data.len() as u64 != expected {
                    return Err(Error::Transfer(format!(
                        "short read at offset {offset}: expected {expected} bytes, got {}",
                        data.len()
                    )));
                }

                Ok((offset, data))
            })
            .buffer_unordered(self.concurrency);

        let mut total = 0u64;
        while let Some(part) = parts.next().await {
            let (offset, data) = part?;
            sink.write_at(&data, offset).await?;
            total += data.len() as u64;
        }

        sink.flush().await?;
        Ok(total)
    }
}

/// Split `size` bytes into inclusive ranges of at most `part_size` bytes
pub fn part_ranges(size: u64, part_size: u64) -> Vec<RangeInclusive<u64>> {
    let part_size = part_size.max(1);
    (0..size)
        .step_by(part_size as usize)
        .map(|start| start..=(start + part_size).min(size) - 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockObjectApi, ObjectMeta};
    use async_trait::async_trait;
    use bytes::Bytes;

    /// Offset-aware in-memory sink
    #[derive(Default)]
    struct MemorySink {
        data: Vec<u8>,
        writes: usize,
    }

    #[async_trait]
    impl WriteAt for MemorySink {
        async fn write_at(&mut self, buf: &[u8], offset: u64) -> std::io::Result<()> {
            let end = offset as usize + buf.len();
            if self.data.len() < end {
                self.data.resize(end, 0);
            }
            self.data[offset as usize..end].copy_from_slice(buf);
            self.writes += 1;
            Ok(())
        }
    }

    const CONTENT: &[u8] = b"the quick brown fox jumps over the lazy dog";

    fn object_mock() -> MockObjectApi {
        let mut mock = MockObjectApi::new();
        mock.expect_head_object().returning(|_, _| {
            Ok(ObjectMeta {
                size: CONTENT.len() as u64,
                etag: Some("\"v1\"".to_string()),
            })
        });
        mock.expect_get_range().returning(|_, _, range, etag| {
            assert_eq!(etag.as_deref(), Some("\"v1\""));
            let slice = &CONTENT[*range.start() as usize..=*range.end() as usize];
            Ok(Bytes::copy_from_slice(slice))
        });
        mock
    }

    #[test]
    fn test_part_ranges() {
        assert_eq!(part_ranges(10, 4), vec![0..=3, 4..=7, 8..=9]);
        assert_eq!(part_ranges(8, 4), vec![0..=3, 4..=7]);
        assert_eq!(part_ranges(3, 8), vec![0..=2]);
        assert!(part_ranges(0, 8).is_empty());
    }

    #[tokio::test]
    async fn test_sequential_download() {
        let download = RangedDownload::new(Arc::new(object_mock()), 5);
        let mut sink = MemorySink::default();

        let written = download.run("bucket", "fox.txt", &mut sink).await.unwrap();

        assert_eq!(written, CONTENT.len() as u64);
        assert_eq!(sink.data, CONTENT);
        assert_eq!(sink.writes, 9);
    }

    #[tokio::test]
    async fn test_concurrent_download_with_offset_aware_sink() {
        let download = RangedDownload::new(Arc::new(object_mock()), 4).concurrency(4);
        let mut sink = MemorySink::default();

        download.run("bucket", "fox.txt", &mut sink).await.unwrap();

        assert_eq!(sink.data, CONTENT);
    }

    #[tokio::test]
    async fn test_empty_object() {
        let mut mock = MockObjectApi::new();
        mock.expect_head_object().times(1).returning(|_, _| {
            Ok(ObjectMeta {
                size: 0,
                etag: None,
            })
        });
        mock.expect_get_range().never();

        let download = RangedDownload::new(Arc::new(mock), 4);
        let mut sink = MemorySink::default();

        assert_eq!(download.run("bucket", "empty", &mut sink).await.unwrap(), 0);
        assert!(sink.data.is_empty());
    }

    #[tokio::test]
    async fn test_short_read_is_transfer_error() {
        let mut mock = MockObjectApi::new();
        mock.expect_head_object().returning(|_, _| {
            Ok(ObjectMeta {
                size: 10,
                etag: None,
            })
        });
        mock.expect_get_range()
            .returning(|_, _, _, _| Ok(Bytes::from_static(b"abc")));

        let download = RangedDownload::new(Arc::new(mock), 4);
        let mut sink = MemorySink::default();

        let result = download.run("bucket", "key", &mut sink).await;
        assert!(matches!(result, Err(Error::Transfer(_))));
    }
}
