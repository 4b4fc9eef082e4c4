//! Parallel upload of an extracted directory tree.
//!
//! One task per regular file, no concurrency limit. Every spawned task is
//! awaited before returning; the first failure observed is reported and the
//! rest are dropped. Objects that were already uploaded stay in place.

use crate::{
    errors::error_chain,
    services::{
        content_type, object_client::ObjectClient, staging::StagingDir, storage::StorageError,
    },
};
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum FanOutError {
    #[error("failed to walk {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to upload `{key}`")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("upload task failed")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// A file found under the staging directory and where it will be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub content_type: &'static str,
}

/// Walk the staging directory and plan one upload per regular file.
///
/// Directories are descended into but not uploaded. Blocking.
pub fn collect_uploads(staging: &StagingDir) -> Result<Vec<PendingUpload>, FanOutError> {
    let mut uploads = Vec::new();

    for entry in WalkDir::new(staging.path()) {
        let entry = entry.map_err(|source| FanOutError::Walk {
            path: staging.path().to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(remote_key) = staging.remote_key_for(entry.path()) else {
            continue;
        };
        let extension = content_type::extension_of(&remote_key);
        uploads.push(PendingUpload {
            content_type: content_type::resolve(extension),
            local_path: entry.into_path(),
            remote_key,
        });
    }

    Ok(uploads)
}

/// Upload every regular file under `staging` to `bucket` concurrently.
///
/// Returns the number of files published.
pub async fn upload_all(
    client: &ObjectClient,
    staging: &StagingDir,
    bucket: &str,
) -> Result<usize, FanOutError> {
    let walk_root = staging.clone();
    let uploads = tokio::task::spawn_blocking(move || collect_uploads(&walk_root)).await??;
    info!(files = uploads.len(), bucket, "uploading extracted files");

    let mut tasks = JoinSet::new();
    for upload in uploads {
        let client = client.clone();
        let bucket = bucket.to_string();
        tasks.spawn(async move {
            client
                .publish(
                    &upload.local_path,
                    &upload.remote_key,
                    &bucket,
                    upload.content_type,
                )
                .await
                .map_err(|source| FanOutError::Upload {
                    key: upload.remote_key,
                    source,
                })
        });
    }

    let mut published = 0usize;
    let mut first_error: Option<FanOutError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(FanOutError::from).and_then(|outcome| outcome) {
            Ok(()) => published += 1,
            Err(err) if first_error.is_none() => {
                error!(error = %error_chain(&err), "upload failed");
                first_error = Some(err);
            }
            Err(err) => debug!(error = %error_chain(&err), "additional upload failure dropped"),
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(published),
    }
}
