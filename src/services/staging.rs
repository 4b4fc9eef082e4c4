//! Per-invocation local working directories.
//!
//! A staging directory lives at `<root>/<unix-nanos><prefix>`, where the
//! prefix mirrors the directory part of the source object key. The
//! `<root>/<unix-nanos>` portion is the *extraction base*: destination keys
//! are computed relative to it, so `uploads/site.zip` containing `a.txt`
//! publishes `uploads/a.txt`.
//!
//! Staging directories are never removed here; the execution environment
//! reclaims them.

use chrono::Utc;
use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use tokio::fs;
use tracing::info;

/// A created staging directory and the base its destination keys hang off.
#[derive(Debug, Clone)]
pub struct StagingDir {
    base: PathBuf,
    path: PathBuf,
}

impl StagingDir {
    /// Directory the archive is downloaded into and extracted under.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<root>/<unix-nanos>`.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Destination key for a file below the staging directory: its path
    /// relative to the extraction base, joined with `/`.
    ///
    /// Returns `None` for paths outside the base.
    pub fn remote_key_for(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.base).ok()?;
        let segments: Vec<String> = relative
            .components()
            .map(|component| match component {
                Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Option<_>>()?;
        if segments.is_empty() {
            return None;
        }
        Some(segments.join("/"))
    }
}

/// Destination-folder hint for an object key: `""` for keys without a
/// directory, otherwise `/` followed by the directory part.
///
/// Empty, `.` and `..` segments are dropped so a hostile key cannot move the
/// staging directory outside its root.
pub fn prefix_for_key(key: &str) -> String {
    let dir = match key.rfind('/') {
        Some(idx) => &key[..idx],
        None => return String::new(),
    };

    let segments: Vec<&str> = dir
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect();

    if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Create a fresh staging directory under `root` stamped with the current
/// time in nanoseconds.
pub async fn create_staging_dir(root: &Path, prefix: &str) -> std::io::Result<StagingDir> {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    create_staging_dir_at(root, nanos, prefix).await
}

/// Create the staging directory for an explicit timestamp.
///
/// Anything already present at the derived path is removed first, so two
/// calls with the same timestamp and prefix leave an empty directory rather
/// than merging contents.
pub async fn create_staging_dir_at(
    root: &Path,
    nanos: i64,
    prefix: &str,
) -> std::io::Result<StagingDir> {
    let base = root.join(nanos.to_string());
    let path = PathBuf::from(format!("{}{}", base.display(), prefix));

    match fs::remove_dir_all(&path).await {
        Ok(()) => info!(path = %path.display(), "removed stale staging directory"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    fs::create_dir_all(&path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, std::fs::Permissions::from_mode(0o777)).await?;
    }

    info!(path = %path.display(), "created staging directory");
    Ok(StagingDir { base, path })
}
