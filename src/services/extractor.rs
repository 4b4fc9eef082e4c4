//! ZIP extraction into a staging directory.
//!
//! Entries are written in central-directory order. Any entry whose name is
//! absolute or climbs out of the destination with `..` aborts extraction
//! before anything is written for it. The archive is first moved aside to a
//! hidden name in the same directory, so an entry sharing its file name
//! cannot overwrite it mid-read. On success the moved archive is removed so
//! it is not republished with the extracted files.

use std::{
    fs::{self, File},
    io::{self, BufReader},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;
use zip::{ZipArchive, result::ZipError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("`{path}` is not a readable zip archive")]
    Open {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("failed to read archive entry #{index}")]
    Entry {
        index: usize,
        #[source]
        source: ZipError,
    },
    #[error("archive entry `{0}` resolves outside the extraction root")]
    UnsafeEntryPath(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("extraction task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Extract `archive` under `dest` on the blocking pool.
///
/// Returns the number of regular files written.
pub async fn extract_archive(archive: PathBuf, dest: PathBuf) -> Result<usize, ExtractError> {
    tokio::task::spawn_blocking(move || extract_archive_blocking(&archive, &dest)).await?
}

/// Synchronous body of [`extract_archive`].
pub fn extract_archive_blocking(archive_path: &Path, dest: &Path) -> Result<usize, ExtractError> {
    let working_path = set_aside(archive_path)?;
    let file = File::open(&working_path)?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|source| ExtractError::Open {
            path: archive_path.to_path_buf(),
            source,
        })?;

    let mut written = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|source| ExtractError::Entry { index, source })?;

        let relative = match entry.enclosed_name() {
            Some(relative) => relative.to_path_buf(),
            None => return Err(ExtractError::UnsafeEntryPath(entry.name().to_string())),
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            apply_mode(&target, entry.unix_mode(), 0o700)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)?;
        let bytes = io::copy(&mut entry, &mut out)?;
        apply_mode(&target, entry.unix_mode(), 0o400)?;

        debug!(path = %target.display(), bytes, "inflated file");
        written += 1;
    }

    drop(archive);
    fs::remove_file(&working_path)?;
    info!(
        archive = %archive_path.display(),
        files = written,
        "extracted archive"
    );

    Ok(written)
}

/// Rename the archive to `.<uuid>.zip` next to itself and return the new path.
fn set_aside(archive_path: &Path) -> io::Result<PathBuf> {
    let hidden = archive_path.with_file_name(format!(".{}.zip", Uuid::new_v4()));
    fs::rename(archive_path, &hidden)?;
    Ok(hidden)
}

/// Apply the permission bits recorded in the archive, keeping `owner_bits`
/// so the pipeline can still traverse and read what it extracted.
#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>, owner_bits: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        let bits = (mode & 0o777) | owner_bits;
        fs::set_permissions(path, fs::Permissions::from_mode(bits))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>, _owner_bits: u32) -> io::Result<()> {
    Ok(())
}
