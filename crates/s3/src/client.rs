//! S3 client implementation
//!
//! [`S3Client`] is the connection handle of the S3 backend. It is built once
//! by [`S3Client::connect`] and then serves any number of list, download and
//! upload calls, each resolving its own address and running under its own
//! retry budget.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use skiff_core::{
    Error, Result, RetryConfig, S3Settings, SequentialWriter, resolve, retry_with_backoff,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use crate::api::{ObjectApi, SdkApi};
use crate::download::{DEFAULT_PART_SIZE, RangedDownload};
use crate::endpoint::resolve_endpoint;
use crate::upload::{MAX_PARTS, PartLayout, upload_stream};

/// S3 connection handle
#[derive(Clone)]
pub struct S3Client {
    api: Arc<dyn ObjectApi>,
    retry: RetryConfig,
    part_size: u64,
    max_parts: i32,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("retry", &self.retry)
            .field("part_size", &self.part_size)
            .field("max_parts", &self.max_parts)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    /// Build a client from `settings` and verify it can reach the container
    /// named by `path`
    pub async fn connect(settings: &S3Settings, retry: &RetryConfig, path: &str) -> Result<Self> {
        let address = resolve(path)?;
        let endpoint = resolve_endpoint(settings)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(url) = &endpoint {
            loader = loader.endpoint_url(url);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style)
            .build();

        tracing::debug!(
            region = %settings.region,
            endpoint = endpoint.as_deref().unwrap_or("<default>"),
            force_path_style = settings.force_path_style,
            "Built S3 client"
        );

        let client = Self::with_api(
            Arc::new(SdkApi::new(aws_sdk_s3::Client::from_conf(s3_config))),
            retry.clone(),
        );
        client.probe(&address.container).await?;

        tracing::info!(bucket = %address.container, region = %settings.region, "Connected to S3");
        Ok(client)
    }

    /// Wrap an existing [`ObjectApi`] without probing it
    pub fn with_api(api: Arc<dyn ObjectApi>, retry: RetryConfig) -> Self {
        Self {
            api,
            retry,
            part_size: DEFAULT_PART_SIZE,
            max_parts: MAX_PARTS,
        }
    }

    /// Part size for ranged downloads and multipart uploads
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    /// Cap on parts per multipart upload, clamped to the S3 limit
    pub fn with_max_parts(mut self, max_parts: i32) -> Self {
        self.max_parts = max_parts.clamp(1, MAX_PARTS);
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Check that `container` is reachable by listing at most zero keys
    pub async fn probe(&self, container: &str) -> Result<()> {
        let api = self.api.as_ref();

        retry_with_backoff(
            &self.retry,
            move || async move {
                api.list_page(container, "", Some(0), None)
                    .await
                    .map_err(into_connection_error)
            },
            Error::is_retryable,
        )
        .await?;

        Ok(())
    }

    /// List keys under `path`, relative to the path's key
    ///
    /// Keys keep the order the service returned them in. A prefix matching
    /// nothing yields an empty list.
    pub async fn list_files(&self, path: &str) -> Result<Vec<String>> {
        let address = resolve(path)?;
        let api = self.api.as_ref();
        let addr = &address;

        let keys = retry_with_backoff(
            &self.retry,
            move || async move { list_all(api, &addr.container, &addr.key).await },
            Error::is_retryable,
        )
        .await?;

        tracing::debug!(path = %address, count = keys.len(), "Listed objects");

        Ok(keys
            .into_iter()
            .map(|key| key.replacen(address.key.as_str(), "", 1))
            .collect())
    }

    /// Stream the object at `path` into `sink`
    ///
    /// The transfer runs at concurrency 1 so parts reach `sink` in order. A
    /// retry restarts from the first byte and writes it to `sink` again.
    pub async fn download<W>(&self, path: &str, sink: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let address = resolve(path)?;

        // SequentialWriter drops offsets, which is only sound for in-order parts
        let transfer = RangedDownload::new(self.api.clone(), self.part_size).concurrency(1);
        let sink = Mutex::new(SequentialWriter::new(sink));
        let (transfer, addr, sink) = (&transfer, &address, &sink);

        let written = retry_with_backoff(
            &self.retry,
            move || async move {
                let mut sink = sink.lock().await;
                if sink.bytes_written() > 0 {
                    tracing::warn!(
                        path = %addr,
                        bytes = sink.bytes_written(),
                        "Restarting download into a sink that already holds data"
                    );
                }
                transfer.run(&addr.container, &addr.key, &mut *sink).await
            },
            Error::is_retryable,
        )
        .await?;

        tracing::debug!(path = %address, bytes = written, "Downloaded object");
        Ok(())
    }

    /// Store the contents of `stream` at `dest_path`
    ///
    /// A destination without a key is completed with the file name of
    /// `source_hint`. A retry continues reading `stream` from wherever the
    /// failed attempt left it.
    pub async fn upload<R>(&self, dest_path: &str, source_hint: &str, stream: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let address = resolve(dest_path)?.with_default_key(source_hint)?;

        let api = self.api.as_ref();
        let layout = PartLayout::new(self.part_size).max_parts(self.max_parts);
        let stream = Mutex::new(stream);
        let (addr, stream) = (&address, &stream);

        let written = retry_with_backoff(
            &self.retry,
            move || async move {
                let mut stream = stream.lock().await;
                upload_stream(api, &addr.container, &addr.key, layout, &mut **stream).await
            },
            Error::is_retryable,
        )
        .await?;

        tracing::debug!(path = %address, bytes = written, "Uploaded object");
        Ok(())
    }
}

/// Collect every key under `prefix`, following continuation tokens
async fn list_all(api: &dyn ObjectApi, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut token = None;

    loop {
        let page = api.list_page(bucket, prefix, None, token).await?;
        keys.extend(page.keys);

        match page.next_token {
            Some(next) => token = Some(next),
            None => return Ok(keys),
        }
    }
}

fn into_connection_error(err: Error) -> Error {
    match err {
        Error::Transfer(msg) => Error::Connection(msg),
        other => other,
    }
}
