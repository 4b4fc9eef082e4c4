//! Filesystem-backed object store.
//!
//! Each bucket is a directory under `base_path`; object payloads live at
//! `base_path/{bucket}/{key}` so the layout can be browsed directly.
//! Per-object metadata (content type, size, MD5 etag, last-modified) is kept
//! as a JSON sidecar at `base_path/.metadata/{bucket}/{key}.json`. Bucket
//! names cannot start with a dot, so the metadata tree never collides with
//! a bucket.

use super::{ObjectStorage, StorageError, StorageResult};
use crate::models::object::StoredObject;
use async_trait::async_trait;
use chrono::Utc;
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const METADATA_DIR: &str = ".metadata";
const TMP_PREFIX: &str = ".tmp-";
const COPY_BUF_LEN: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct LocalStorage {
    /// Directory holding one sub-directory per bucket.
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create the bucket directory if it does not exist yet.
    pub async fn create_bucket(&self, name: &str) -> StorageResult<()> {
        self.ensure_bucket_name_safe(name)?;
        fs::create_dir_all(self.bucket_root(name)).await?;
        Ok(())
    }

    /// Read the recorded metadata for an object.
    pub async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;

        let raw = match fs::read(self.metadata_path(bucket, key)).await {
            Ok(raw) => raw,
            Err(err) => return Err(self.not_found_or_io(bucket, key, err).await),
        };
        serde_json::from_slice(&raw)
            .map_err(|err| StorageError::Io(io::Error::new(ErrorKind::InvalidData, err)))
    }

    /// All object keys in a bucket, sorted.
    pub async fn list_keys(&self, bucket: &str) -> StorageResult<Vec<String>> {
        self.ensure_bucket_name_safe(bucket)?;
        let root = self.bucket_root(bucket);
        if !fs::try_exists(&root).await? {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }

        let keys = tokio::task::spawn_blocking(move || -> io::Result<Vec<String>> {
            let mut keys = Vec::new();
            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = entry.map_err(io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with(TMP_PREFIX) {
                    continue;
                }
                if let Ok(relative) = entry.path().strip_prefix(&root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|err| StorageError::Io(io::Error::other(err)))??;

        Ok(keys)
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that are empty, too long, begin with `/`, contain `..`,
    /// control characters or backslashes.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.contains("..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(StorageError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(&self, name: &str) -> StorageResult<()> {
        let reject = |reason: &str| {
            Err(StorageError::InvalidBucketName {
                name: name.to_string(),
                reason: reason.into(),
            })
        };

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return reject("must be between 3 and 63 characters");
        }

        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return reject("allowed characters are lowercase letters, digits, dots, and hyphens");
        }

        if name.starts_with('.')
            || name.ends_with('.')
            || name.starts_with('-')
            || name.ends_with('-')
        {
            return reject("must start and end with a lowercase letter or digit");
        }

        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return reject("cannot contain consecutive dots or dot-hyphen combinations");
        }

        if is_ipv4_like(name) {
            return reject("must not be formatted like an IP address");
        }

        Ok(())
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_root(bucket).join(key)
    }

    fn metadata_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(METADATA_DIR).join(bucket)
    }

    fn metadata_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.metadata_root(bucket).join(format!("{key}.json"))
    }

    /// Map a missing file onto the S3-style not-found errors.
    async fn not_found_or_io(&self, bucket: &str, key: &str, err: io::Error) -> StorageError {
        if err.kind() != ErrorKind::NotFound {
            return StorageError::Io(err);
        }
        let bucket_exists = fs::metadata(self.bucket_root(bucket))
            .await
            .is_ok_and(|meta| meta.is_dir());
        if !bucket_exists {
            return StorageError::BucketNotFound(bucket.to_string());
        }
        StorageError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Remove empty directories from `start` up to (not including) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Copy `src` into `dst`, returning the byte count and hex MD5 of the data.
async fn copy_hashing(src: &Path, dst: &Path) -> io::Result<(u64, String)> {
    let mut input = File::open(src).await?;
    let mut output = File::create(dst).await?;
    let mut digest = Context::new();
    let mut size = 0u64;
    let mut buf = vec![0u8; COPY_BUF_LEN];

    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        digest.consume(&buf[..n]);
        output.write_all(&buf[..n]).await?;
        size += n as u64;
    }
    output.flush().await?;
    output.sync_all().await?;

    Ok((size, format!("{:x}", digest.compute())))
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
    ) -> StorageResult<u64> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;

        let mut source = match File::open(self.object_path(bucket, key)).await {
            Ok(source) => source,
            Err(err) => return Err(self.not_found_or_io(bucket, key, err).await),
        };
        let mut file = File::create(dest).await?;
        let bytes = tokio::io::copy(&mut source, &mut file).await?;
        file.flush().await?;

        Ok(bytes)
    }

    /// Stream the file to a temporary sibling, fsync it, then rename it into
    /// place and record its metadata. Overwrites existing objects.
    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        src: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!("{TMP_PREFIX}{}", Uuid::new_v4()));
        let (size_bytes, etag) = match copy_hashing(src, &tmp_path).await {
            Ok(copied) => copied,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        };
        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        let object = StoredObject {
            key: key.to_string(),
            content_type: content_type.map(str::to_owned),
            size_bytes,
            etag,
            last_modified: Utc::now(),
        };
        let meta_path = self.metadata_path(bucket, key);
        if let Some(meta_parent) = meta_path.parent() {
            fs::create_dir_all(meta_parent).await?;
        }
        let raw = serde_json::to_vec_pretty(&object)
            .map_err(|err| StorageError::Io(io::Error::new(ErrorKind::InvalidData, err)))?;
        fs::write(&meta_path, raw).await?;

        debug!(bucket, key, size_bytes, "stored object {}", file_path.display());
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        if let Err(err) = fs::remove_file(&file_path).await {
            return Err(self.not_found_or_io(bucket, key, err).await);
        }
        debug!("removed physical file {}", file_path.display());

        let meta_path = self.metadata_path(bucket, key);
        match fs::remove_file(&meta_path).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("metadata {} already missing", meta_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.bucket_root(bucket)).await;
        }
        if let Some(parent) = meta_path.parent() {
            self.prune_empty_dirs(parent, &self.metadata_root(bucket)).await;
        }

        Ok(())
    }
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_file(contents: &[u8]) -> (tempfile::TempDir, LocalStorage, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("buckets"));
        let src = dir.path().join("payload.bin");
        std::fs::write(&src, contents).unwrap();
        (dir, storage, src)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_payload_and_metadata() {
        let (dir, storage, src) = store_with_file(b"hello world").await;

        storage
            .put_object_from_file("assets", "docs/readme.txt", &src, Some("text/plain"))
            .await
            .unwrap();

        let dest = dir.path().join("downloaded.txt");
        let bytes = storage
            .get_object_to_file("assets", "docs/readme.txt", &dest)
            .await
            .unwrap();
        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");

        let meta = storage.head_object("assets", "docs/readme.txt").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.size_bytes, 11);
        assert_eq!(meta.etag, format!("{:x}", md5::compute(b"hello world")));
    }

    #[tokio::test]
    async fn list_keys_reports_nested_objects_in_order() {
        let (_dir, storage, src) = store_with_file(b"x").await;
        for key in ["z.txt", "a/b/c.txt", "a/a.txt"] {
            storage
                .put_object_from_file("assets", key, &src, None)
                .await
                .unwrap();
        }

        let keys = storage.list_keys("assets").await.unwrap();
        assert_eq!(keys, vec!["a/a.txt", "a/b/c.txt", "z.txt"]);
    }

    #[tokio::test]
    async fn missing_objects_and_buckets_are_reported() {
        let (dir, storage, _src) = store_with_file(b"x").await;
        let dest = dir.path().join("out");

        let err = storage
            .get_object_to_file("nobucket", "a.txt", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BucketNotFound(_)));

        storage.create_bucket("assets").await.unwrap();
        let err = storage
            .get_object_to_file("assets", "a.txt", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn head_and_delete_distinguish_missing_bucket_from_missing_object() {
        let (_dir, storage, _src) = store_with_file(b"x").await;

        assert!(matches!(
            storage.head_object("ghost", "a.txt").await,
            Err(StorageError::BucketNotFound(_))
        ));
        assert!(matches!(
            storage.delete_object("ghost", "a.txt").await,
            Err(StorageError::BucketNotFound(_))
        ));

        // A plain file where the bucket directory should be is not a bucket.
        std::fs::create_dir_all(storage.base_path()).unwrap();
        std::fs::write(storage.base_path().join("notdir"), b"").unwrap();
        assert!(matches!(
            storage.head_object("notdir", "a.txt").await,
            Err(StorageError::BucketNotFound(_))
        ));

        storage.create_bucket("assets").await.unwrap();
        assert!(matches!(
            storage.delete_object("assets", "a.txt").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_payload_metadata_and_empty_dirs() {
        let (_dir, storage, src) = store_with_file(b"x").await;
        storage
            .put_object_from_file("assets", "deep/nested/file.txt", &src, None)
            .await
            .unwrap();

        storage
            .delete_object("assets", "deep/nested/file.txt")
            .await
            .unwrap();

        assert!(storage.list_keys("assets").await.unwrap().is_empty());
        assert!(!storage.base_path().join("assets/deep").exists());
        assert!(matches!(
            storage.head_object("assets", "deep/nested/file.txt").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
        assert!(matches!(
            storage.delete_object("assets", "deep/nested/file.txt").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_unsafe_keys_and_bucket_names() {
        let (_dir, storage, src) = store_with_file(b"x").await;

        for key in ["", "/abs", "../up", "a\\b"] {
            let err = storage
                .put_object_from_file("assets", key, &src, None)
                .await
                .unwrap_err();
            assert!(matches!(err, StorageError::InvalidObjectKey(_)), "{key}");
        }

        for bucket in ["", "ab", "Upper", "-dash", "a..b", "192.168.0.1"] {
            let err = storage
                .put_object_from_file(bucket, "k", &src, None)
                .await
                .unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidBucketName { .. }),
                "{bucket}"
            );
        }
    }

    #[test]
    fn ipv4_detection() {
        assert!(is_ipv4_like("10.0.0.1"));
        assert!(!is_ipv4_like("10.0.0"));
        assert!(!is_ipv4_like("my.bucket.name.x"));
        assert!(!is_ipv4_like("300.1.1.1"));
    }
}
