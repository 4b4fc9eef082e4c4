#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    collections::HashSet,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::{ZipWriter, write::SimpleFileOptions};
use zip_expander::{
    config::InvocationSettings,
    services::{
        expander::{ArchiveExpander, BatchMode},
        object_client::ObjectClient,
        storage::{LocalStorage, ObjectStorage, StorageError, StorageResult},
    },
};

pub const SOURCE_BUCKET: &str = "incoming";
pub const DEST_BUCKET: &str = "published";

/// Write a zip at `path`; `None` contents add a directory entry.
pub fn build_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, contents) in entries {
        match contents {
            Some(data) => {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(data).unwrap();
            }
            None => writer
                .add_directory(*name, SimpleFileOptions::default())
                .unwrap(),
        }
    }
    writer.finish().unwrap();
}

/// Local storage that records calls and fails on demand.
pub struct ScriptedStorage {
    pub inner: LocalStorage,
    pub fail_put_keys: HashSet<String>,
    pub fail_delete: bool,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedStorage {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            fail_put_keys: HashSet::new(),
            fail_delete: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn injected(operation: &'static str, bucket: &str, key: &str) -> StorageError {
    StorageError::Transport {
        operation,
        bucket: bucket.to_string(),
        key: key.to_string(),
        source: "injected failure".into(),
    }
}

#[async_trait]
impl ObjectStorage for ScriptedStorage {
    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
    ) -> StorageResult<u64> {
        self.record(format!("get {bucket}/{key}"));
        self.inner.get_object_to_file(bucket, key, dest).await
    }

    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        src: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        self.record(format!("put {bucket}/{key}"));
        if self.fail_put_keys.contains(key) {
            return Err(injected("PutObject", bucket, key));
        }
        self.inner
            .put_object_from_file(bucket, key, src, content_type)
            .await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.record(format!("delete {bucket}/{key}"));
        if self.fail_delete {
            return Err(injected("DeleteObject", bucket, key));
        }
        self.inner.delete_object(bucket, key).await
    }
}

/// Temp directories, storage and an expander wired together.
pub struct Harness {
    pub dir: TempDir,
    pub storage: Arc<ScriptedStorage>,
    pub expander: ArchiveExpander,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(|storage| storage)
    }

    pub fn with_storage(configure: impl FnOnce(ScriptedStorage) -> ScriptedStorage) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStorage::new(dir.path().join("buckets"));
        let storage = Arc::new(configure(ScriptedStorage::new(local)));
        let staging_root = dir.path().join("staging");
        std::fs::create_dir_all(&staging_root).unwrap();
        let expander = ArchiveExpander::new(ObjectClient::new(storage.clone()), staging_root);
        Self {
            dir,
            storage,
            expander,
        }
    }

    pub fn staging_root(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    /// Build an archive and store it as `SOURCE_BUCKET/key`.
    pub async fn put_archive(&self, key: &str, entries: &[(&str, Option<&[u8]>)]) {
        let path = self.dir.path().join(format!("upload-{}", key.replace('/', "_")));
        build_zip(&path, entries);
        self.storage
            .inner
            .put_object_from_file(SOURCE_BUCKET, key, &path, Some("application/zip"))
            .await
            .unwrap();
    }

    /// Store arbitrary bytes as `SOURCE_BUCKET/key`.
    pub async fn put_raw(&self, key: &str, data: &[u8]) {
        let path = self.dir.path().join(format!("raw-{}", key.replace('/', "_")));
        std::fs::write(&path, data).unwrap();
        self.storage
            .inner
            .put_object_from_file(SOURCE_BUCKET, key, &path, None)
            .await
            .unwrap();
    }

    pub async fn dest_keys(&self) -> Vec<String> {
        self.storage
            .inner
            .list_keys(DEST_BUCKET)
            .await
            .unwrap_or_default()
    }

    pub async fn source_keys(&self) -> Vec<String> {
        self.storage
            .inner
            .list_keys(SOURCE_BUCKET)
            .await
            .unwrap_or_default()
    }

    pub async fn content_type_of(&self, key: &str) -> Option<String> {
        self.storage
            .inner
            .head_object(DEST_BUCKET, key)
            .await
            .unwrap()
            .content_type
    }

    /// Files with a `.zip` extension anywhere under the staging root.
    pub fn staged_archives(&self) -> Vec<PathBuf> {
        WalkDir::new(self.staging_root())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "zip"))
            .map(|e| e.into_path())
            .collect()
    }
}

pub fn settings() -> InvocationSettings {
    InvocationSettings {
        destination_bucket: DEST_BUCKET.to_string(),
        delete_source: false,
        batch_mode: BatchMode::FirstArchive,
    }
}
