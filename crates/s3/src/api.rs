//! Object-storage calls used by the backend
//!
//! [`ObjectApi`] is the narrow set of S3 operations the lister, downloader and
//! uploader need. [`SdkApi`] implements it with aws-sdk-s3; tests substitute a
//! mock.

use std::ops::RangeInclusive;

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use skiff_core::{Error, Result};

/// One page of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Size and version tag of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    pub etag: Option<String>,
}

/// A part accepted by the service during a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub etag: String,
}

/// S3 operations the backend is built on
///
/// Every failure is reported as [`Error::Transfer`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectApi: Send + Sync {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: Option<i32>,
        continuation_token: Option<String>,
    ) -> Result<ListPage>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta>;

    /// Fetch an inclusive byte range, optionally pinned to an ETag
    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: RangeInclusive<u64>,
        etag: Option<String>,
    ) -> Result<Bytes>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    /// Returns the upload id
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;

    /// Returns the part's ETag
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()>;

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
    -> Result<()>;
}

/// [`ObjectApi`] backed by aws-sdk-s3
#[derive(Debug, Clone)]
pub struct SdkApi {
    inner: aws_sdk_s3::Client,
}

impl SdkApi {
    pub fn new(inner: aws_sdk_s3::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Format AWS SDK error into a detailed error message
fn format_sdk_error<E>(error: &SdkError<E>) -> String
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    match error {
        SdkError::ServiceError(service_err) => {
            let err = service_err.err();
            let mut msg = format!("Service error: {err}");
            if let Some(code) = err.code() {
                msg.push_str(&format!(" (code: {code})"));
            }
            if let Some(message) = err.message() {
                msg.push_str(&format!(": {message}"));
            }
            msg
        }
        SdkError::ConstructionFailure(err) => {
            format!("Request construction failed: {err:?}")
        }
        SdkError::TimeoutError(_) => "Request timeout".to_string(),
        SdkError::DispatchFailure(err) => {
            format!("Network dispatch error: {err:?}")
        }
        SdkError::ResponseError(err) => {
            format!("Response error: {err:?}")
        }
        _ => error.to_string(),
    }
}

fn transfer_error<E>(context: &str) -> impl FnOnce(SdkError<E>) -> Error + '_
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    move |e| Error::Transfer(format!("{context}: {}", format_sdk_error(&e)))
}

/// Object size from a HEAD response; the ranged download cannot work without it
fn object_size(bucket: &str, key: &str, content_length: Option<i64>) -> Result<u64> {
    match content_length {
        Some(len) if len >= 0 => Ok(len as u64),
        Some(len) => Err(Error::Transfer(format!(
            "head object: {bucket}/{key} reported length {len}"
        ))),
        None => Err(Error::Transfer(format!(
            "head object: {bucket}/{key} has no Content-Length"
        ))),
    }
}

#[async_trait]
impl ObjectApi for SdkApi {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: Option<i32>,
        continuation_token: Option<String>,
    ) -> Result<ListPage> {
        let mut request = self.inner.list_objects_v2().bucket(bucket);

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }

        if let Some(max) = max_keys {
            request = request.max_keys(max);
        }

        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(transfer_error("list objects"))?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage { keys, next_token })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(transfer_error("head object"))?;

        Ok(ObjectMeta {
            size: object_size(bucket, key, response.content_length())?,
            etag: response.e_tag().map(str::to_string),
        })
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: RangeInclusive<u64>,
        etag: Option<String>,
    ) -> Result<Bytes> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={}-{}", range.start(), range.end()))
            .set_if_match(etag)
            .send()
            .await
            .map_err(transfer_error("get object"))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Transfer(format!("read object body: {e}")))?
            .into_bytes();

        Ok(data)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(transfer_error("put object"))?;

        Ok(())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(transfer_error("create multipart upload"))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Transfer("No upload ID returned".to_string()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String> {
        let response = self
            .inner
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(transfer_error("upload part"))?;

        response
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| Error::Transfer(format!("No ETag returned for part {part_number}")))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()> {
        let completed_parts: Vec<CompletedPart> = parts
            .into_iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(p.etag)
                    .build()
            })
            .collect();

        let multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(multipart_upload)
            .send()
            .await
            .map_err(transfer_error("complete multipart upload"))?;

        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(transfer_error("abort multipart upload"))?;

        Ok(())
    }
}
