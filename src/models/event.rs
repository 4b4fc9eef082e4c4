//! S3 event notifications.
//!
//! Only the bucket name and object key drive processing; the remaining
//! fields are accepted so real notification payloads deserialize as-is.

use serde::{Deserialize, Serialize};

/// A batch of change notifications (`{"Records": [...]}`).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

/// One notification: an object was created at `s3.bucket.name`/`s3.object.key`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_name: Option<String>,
    pub event_source: Option<String>,
    pub aws_region: Option<String>,
    pub s3: S3Entity,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct S3Object {
    /// Key exactly as delivered; not URL-decoded.
    pub key: String,
    pub size: Option<u64>,
    #[serde(rename = "eTag")]
    pub e_tag: Option<String>,
}

impl EventRecord {
    /// An `ObjectCreated:Put` record for `bucket`/`key`.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            event_name: Some("ObjectCreated:Put".into()),
            event_source: Some("aws:s3".into()),
            aws_region: None,
            s3: S3Entity {
                bucket: S3Bucket {
                    name: bucket.into(),
                },
                object: S3Object {
                    key: key.into(),
                    size: None,
                    e_tag: None,
                },
            },
        }
    }

    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    pub fn key(&self) -> &str {
        &self.s3.object.key
    }
}

impl S3Event {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }
}
