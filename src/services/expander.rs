//! Notification handling: stage → fetch → extract → publish → delete.

use crate::{
    config::InvocationSettings,
    errors::error_chain,
    models::event::EventRecord,
    services::{
        content_type,
        extractor::{self, ExtractError},
        fanout::{self, FanOutError},
        object_client::ObjectClient,
        staging,
        storage::StorageError,
    },
};
use serde::Serialize;
use std::{io, path::PathBuf};
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// Only keys with this extension are expanded.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// How many archive records of a batch are processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// Stop after the first archive record has been expanded. Non-archive
    /// records before it are skipped; records after it are never looked at.
    #[default]
    FirstArchive,
    /// Expand every archive record in the batch.
    All,
}

/// Outcome of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpandReport {
    /// Archives fully expanded and published.
    pub expanded: usize,
    /// Records skipped because the key is not an archive.
    pub skipped: usize,
    /// Files published across all expanded archives.
    pub published: usize,
    /// Source objects removed after publishing.
    pub deleted: usize,
}

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("failed to prepare staging directory")]
    Staging(#[source] io::Error),
    #[error("failed to fetch `{key}` from bucket `{bucket}`")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("failed to extract `{key}`")]
    Extract {
        key: String,
        #[source]
        source: ExtractError,
    },
    #[error("failed to publish contents of `{key}` to bucket `{bucket}`")]
    Publish {
        bucket: String,
        key: String,
        #[source]
        source: FanOutError,
    },
}

pub fn is_archive_key(key: &str) -> bool {
    content_type::extension_of(key) == ARCHIVE_EXTENSION
}

/// Expands archives named by change notifications.
#[derive(Clone)]
pub struct ArchiveExpander {
    client: ObjectClient,
    staging_root: PathBuf,
}

impl ArchiveExpander {
    pub fn new(client: ObjectClient, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            staging_root: staging_root.into(),
        }
    }

    pub fn staging_root(&self) -> &std::path::Path {
        &self.staging_root
    }

    /// Process a notification batch.
    ///
    /// Any staging, fetch, extract or publish failure aborts the whole
    /// batch. Deleting the source object is best-effort.
    pub async fn handle(
        &self,
        records: &[EventRecord],
        settings: &InvocationSettings,
    ) -> Result<ExpandReport, ExpandError> {
        let span = info_span!("invocation", id = %Uuid::new_v4(), records = records.len());
        self.process(records, settings).instrument(span).await
    }

    async fn process(
        &self,
        records: &[EventRecord],
        settings: &InvocationSettings,
    ) -> Result<ExpandReport, ExpandError> {
        let mut report = ExpandReport::default();

        for record in records {
            let (bucket, key) = (record.bucket(), record.key());
            info!(bucket, key, "received notification");

            if !is_archive_key(key) {
                info!(key, "skipping non-zip object");
                report.skipped += 1;
                continue;
            }

            let published = self
                .expand(bucket, key, settings)
                .await
                .inspect_err(|err| error!(bucket, key, error = %error_chain(err), "archive expansion failed"))?;
            report.expanded += 1;
            report.published += published;

            if settings.delete_source {
                match self.client.delete(bucket, key).await {
                    Ok(()) => report.deleted += 1,
                    Err(err) => warn!(bucket, key, error = %error_chain(&err), "failed to delete source object"),
                }
            }

            if settings.batch_mode == BatchMode::FirstArchive {
                return Ok(report);
            }
        }

        Ok(report)
    }

    /// Run one archive through the pipeline; returns the published file count.
    async fn expand(
        &self,
        bucket: &str,
        key: &str,
        settings: &InvocationSettings,
    ) -> Result<usize, ExpandError> {
        let prefix = staging::prefix_for_key(key);
        let staging = staging::create_staging_dir(&self.staging_root, &prefix)
            .await
            .map_err(ExpandError::Staging)?;

        let archive = self
            .client
            .fetch(bucket, key, staging.path())
            .await
            .map_err(|source| ExpandError::Fetch {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;

        extractor::extract_archive(archive, staging.path().to_path_buf())
            .await
            .map_err(|source| ExpandError::Extract {
                key: key.to_string(),
                source,
            })?;

        let destination = settings.destination_bucket.as_str();
        fanout::upload_all(&self.client, &staging, destination)
            .await
            .map_err(|source| ExpandError::Publish {
                bucket: destination.to_string(),
                key: key.to_string(),
                source,
            })
    }
}
