//! # zip-expander
//!
//! Expands ZIP archives dropped into object storage. When a notification
//! reports a new `.zip` object, the archive is downloaded into a per-invocation
//! staging directory, extracted, and every file is republished to a
//! destination bucket under the same relative path, with a content type
//! inferred from its extension. The source archive can optionally be
//! deleted afterwards.
//!
//! The pipeline lives in [`services::expander::ArchiveExpander`]; storage is
//! reached through the [`services::storage::ObjectStorage`] trait so the
//! same pipeline runs against S3 or a local directory store.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
