//! Data models for the archive expander.
//!
//! `event` mirrors the S3 event notification JSON delivered to the service;
//! `object` is the per-object metadata recorded by the local storage backend.

pub mod event;
pub mod object;
