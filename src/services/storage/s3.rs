use super::{ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{Client, primitives::ByteStream};
use std::path::Path;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::debug;

/// S3 backend using the SDK's default credential and region chain.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Build a client from the ambient AWS configuration.
    ///
    /// `endpoint_url` targets an S3-compatible service (MinIO, R2, ...) and
    /// switches to path-style addressing.
    pub async fn from_env(endpoint_url: Option<&str>) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn transport<E>(operation: &'static str, bucket: &str, key: &str, err: E) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::Transport {
        operation,
        bucket: bucket.to_string(),
        key: key.to_string(),
        source: Box::new(err),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
    ) -> StorageResult<u64> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_no_such_key())
                {
                    StorageError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    transport("GetObject", bucket, key, err)
                }
            })?;

        // Stream straight to disk; archives can be large.
        let mut body = output.body.into_async_read();
        let mut file = File::create(dest).await?;
        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|err| transport("GetObject", bucket, key, err))?;
        file.flush().await?;

        debug!(bucket, key, bytes, "s3 download complete");
        Ok(bytes)
    }

    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        src: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let body = ByteStream::from_path(src)
            .await
            .map_err(|err| transport("PutObject", bucket, key, err))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .set_content_type(content_type.map(str::to_owned))
            .send()
            .await
            .map_err(|err| transport("PutObject", bucket, key, err))?;

        debug!(bucket, key, "s3 upload complete");
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| transport("DeleteObject", bucket, key, err))?;
        Ok(())
    }
}
