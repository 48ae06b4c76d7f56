//! `Backend` implementation for S3

use async_trait::async_trait;
use skiff_core::{Backend, Config, Result, RetryConfig, S3Settings};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::client::S3Client;

/// S3 storage backend
#[derive(Debug, Clone, Default)]
pub struct S3Backend {
    settings: S3Settings,
    retry: RetryConfig,
}

impl S3Backend {
    pub fn new(settings: S3Settings, retry: RetryConfig) -> Self {
        Self { settings, retry }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.s3.clone(), config.retry.clone())
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }
}

#[async_trait]
impl Backend for S3Backend {
    type Client = S3Client;

    async fn get_client(&self, path: &str) -> Result<S3Client> {
        S3Client::connect(&self.settings, &self.retry, path).await
    }

    async fn list_files(&self, client: &S3Client, path: &str) -> Result<Vec<String>> {
        client.list_files(path).await
    }

    async fn download(
        &self,
        client: &S3Client,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()> {
        client.download(path, sink).await
    }

    async fn upload(
        &self,
        client: &S3Client,
        dest_path: &str,
        source_hint: &str,
        stream: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<()> {
        client.upload(dest_path, source_hint, stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ListPage, MockObjectApi, ObjectMeta};
    use bytes::Bytes;
    use skiff_core::Error;
    use std::sync::Arc;

    /// Drive a backend only through the trait
    async fn copy_first<B: Backend>(
        backend: &B,
        client: &B::Client,
        prefix: &str,
    ) -> Result<Vec<u8>> {
        let files = backend.list_files(client, prefix).await?;
        let first = files
            .first()
            .ok_or_else(|| Error::Transfer("empty listing".to_string()))?;

        let mut out = Vec::new();
        backend
            .download(client, &format!("{prefix}{first}"), &mut out)
            .await?;
        Ok(out)
    }

    #[tokio::test]
    async fn test_backend_trait_delegates_to_client() {
        let mut mock = MockObjectApi::new();
        mock.expect_list_page().returning(|_, _, _, _| {
            Ok(ListPage {
                keys: vec!["docs/readme.md".to_string()],
                next_token: None,
            })
        });
        mock.expect_head_object().returning(|bucket, key| {
            assert_eq!(bucket, "bucket");
            assert_eq!(key, "docs/readme.md");
            Ok(ObjectMeta {
                size: 6,
                etag: None,
            })
        });
        mock.expect_get_range()
            .returning(|_, _, _, _| Ok(Bytes::from_static(b"# Docs")));
        mock.expect_put_object().times(1).returning(|_, key, body| {
            assert_eq!(key, "readme.md");
            assert_eq!(&body[..], b"# Docs");
            Ok(())
        });

        let backend = S3Backend::default();
        let client = S3Client::with_api(Arc::new(mock), RetryConfig::default());

        let data = copy_first(&backend, &client, "bucket/docs/").await.unwrap();
        assert_eq!(data, b"# Docs");

        let mut stream: &[u8] = &data;
        backend
            .upload(&client, "bucket", "docs/readme.md", &mut stream)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_client_rejects_invalid_path() {
        let backend = S3Backend::default();
        assert!(matches!(
            backend.get_client("").await,
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.s3.region = "us-east-2".to_string();

        let backend = S3Backend::from_config(&config);
        assert_eq!(backend.settings().region, "us-east-2");
    }
}
