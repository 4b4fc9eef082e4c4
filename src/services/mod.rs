//! The expansion pipeline and the storage it runs against.

pub mod content_type;
pub mod expander;
pub mod extractor;
pub mod fanout;
pub mod object_client;
pub mod staging;
pub mod storage;
