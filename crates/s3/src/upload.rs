//! Streaming upload
//!
//! Small streams go up with a single PUT. Anything that fills a whole part is
//! sent as a multipart upload, reading one part at a time so memory use stays
//! bounded by the part size.

use bytes::Bytes;
use skiff_core::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::api::{ObjectApi, UploadedPart};

/// Smallest part S3 accepts for every part but the last
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// S3 limit on parts per multipart upload
pub const MAX_PARTS: i32 = 10_000;

/// How a stream is cut into parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartLayout {
    part_size: u64,
    max_parts: i32,
}

impl PartLayout {
    pub fn new(part_size: u64) -> Self {
        Self {
            part_size: part_size.max(MIN_PART_SIZE),
            max_parts: MAX_PARTS,
        }
    }

    /// Lower the part cap, for servers stricter than S3
    pub fn max_parts(mut self, max_parts: i32) -> Self {
        self.max_parts = max_parts.clamp(1, MAX_PARTS);
        self
    }

    /// Largest stream this layout can store
    pub fn max_object_size(&self) -> u64 {
        self.part_size * self.max_parts as u64
    }
}

/// Upload everything `reader` yields to `bucket/key`, returning the byte count
///
/// A stream longer than `layout` allows fails with
/// [`Error::LimitExceeded`] after the multipart upload is aborted.
pub async fn upload_stream<R>(
    api: &dyn ObjectApi,
    bucket: &str,
    key: &str,
    layout: PartLayout,
    reader: &mut R,
) -> Result<u64>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let part_size = layout.part_size;

    let first = read_part(reader, part_size).await?;
    if (first.len() as u64) < part_size {
        let size = first.len() as u64;
        tracing::debug!(bucket = bucket, key = key, size = size, "Single-request upload");
        api.put_object(bucket, key, Bytes::from(first)).await?;
        return Ok(size);
    }

    let upload_id = api.create_multipart_upload(bucket, key).await?;
    tracing::debug!(bucket = bucket, key = key, upload_id = %upload_id, "Started multipart upload");

    let result = upload_parts(api, bucket, key, &upload_id, layout, first, reader).await;

    if result.is_err()
        && let Err(abort_err) = api.abort_multipart_upload(bucket, key, &upload_id).await
    {
        tracing::warn!(
            upload_id = %upload_id,
            error = %abort_err,
            "Failed to abort multipart upload"
        );
    }

    result
}

async fn upload_parts<R>(
    api: &dyn ObjectApi,
    bucket: &str,
    key: &str,
    upload_id: &str,
    layout: PartLayout,
    first: Vec<u8>,
    reader: &mut R,
) -> Result<u64>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let mut parts = Vec::new();
    let mut total = 0u64;
    let mut part_number = 1i32;
    let mut chunk = first;

    while !chunk.is_empty() {
        if part_number > layout.max_parts {
            return Err(Error::LimitExceeded(format!(
                "{bucket}/{key} is larger than {} bytes ({} parts of {} bytes)",
                layout.max_object_size(),
                layout.max_parts,
                layout.part_size
            )));
        }

        let size = chunk.len() as u64;
        let etag = api
            .upload_part(bucket, key, upload_id, part_number, Bytes::from(chunk))
            .await?;
        parts.push(UploadedPart { part_number, etag });
        total += size;
        part_number += 1;

        chunk = read_part(reader, layout.part_size).await?;
    }

    api.complete_multipart_upload(bucket, key, upload_id, parts)
        .await?;

    Ok(total)
}

/// Read up to `part_size` bytes; a short result means the stream ended
async fn read_part<R>(reader: &mut R, part_size: u64) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let mut buf = Vec::new();
    reader.take(part_size).read_to_end(&mut buf).await?;
    Ok(buf)
}
