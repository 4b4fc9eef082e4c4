//! Represents an object (file) stored in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a single stored object.
///
/// The `StoredObject` struct describes the payload, not the content bytes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Content type (MIME type) supplied at upload time.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: u64,

    /// Hex MD5 of the payload.
    pub etag: String,

    /// Timestamp when object was last written.
    pub last_modified: DateTime<Utc>,
}
