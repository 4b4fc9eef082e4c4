//! Fetch/publish/delete calls the pipeline makes against object storage.

use crate::services::storage::{ObjectStorage, StorageError, StorageResult};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

/// Storage client constructed once at startup and shared by every
/// invocation. Cloning is cheap.
#[derive(Clone)]
pub struct ObjectClient {
    storage: Arc<dyn ObjectStorage>,
}

impl ObjectClient {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Download `bucket/key` into `dest_dir`, naming the file after the last
    /// segment of the key. Returns the local path.
    pub async fn fetch(&self, bucket: &str, key: &str, dest_dir: &Path) -> StorageResult<PathBuf> {
        let file_name = Path::new(key)
            .file_name()
            .ok_or_else(|| StorageError::InvalidObjectKey(key.to_string()))?;
        let local_path = dest_dir.join(file_name);

        let bytes = self
            .storage
            .get_object_to_file(bucket, key, &local_path)
            .await?;
        info!(bucket, key, bytes, path = %local_path.display(), "downloaded object");

        Ok(local_path)
    }

    /// Upload a local file to `bucket/remote_key` with `content_type`.
    pub async fn publish(
        &self,
        local_path: &Path,
        remote_key: &str,
        bucket: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        self.storage
            .put_object_from_file(bucket, remote_key, local_path, Some(content_type))
            .await?;
        info!(bucket, key = remote_key, content_type, "published object");
        Ok(())
    }

    pub async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        info!(bucket, key, "deleting source object");
        self.storage.delete_object(bucket, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::LocalStorage;

    #[tokio::test]
    async fn fetch_names_the_file_after_the_key_basename() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("store"));
        let src = dir.path().join("src.zip");
        std::fs::write(&src, b"zipbytes").unwrap();
        storage
            .put_object_from_file("incoming", "uploads/2024/site.zip", &src, None)
            .await
            .unwrap();

        let client = ObjectClient::new(Arc::new(storage));
        let staging = dir.path().join("staging");
        std::fs::create_dir(&staging).unwrap();

        let local = client
            .fetch("incoming", "uploads/2024/site.zip", &staging)
            .await
            .unwrap();
        assert_eq!(local, staging.join("site.zip"));
        assert_eq!(std::fs::read(local).unwrap(), b"zipbytes");
    }

    #[tokio::test]
    async fn publish_records_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path().join("store")));
        let file = dir.path().join("page.html");
        std::fs::write(&file, b"<html/>").unwrap();

        let client = ObjectClient::new(storage.clone());
        client
            .publish(&file, "site/page.html", "public", "text/html")
            .await
            .unwrap();

        let meta = storage.head_object("public", "site/page.html").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn fetch_of_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("store"));
        storage.create_bucket("incoming").await.unwrap();
        let client = ObjectClient::new(Arc::new(storage));

        let err = client
            .fetch("incoming", "missing.zip", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }
}
