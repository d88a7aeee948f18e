// src/lib.rs

pub mod archive;
pub mod config;
pub mod event;
pub mod key;
pub mod sanitizer;
pub mod schema;
pub mod storage;

// Re-export commonly used types for convenience
pub use archive::{
    plan_event, ArchiveAction, ArchiveOutcome, ArchivePlan, ArchiveTransform, Planned, SkipReason,
};
pub use config::ArchiveConfig;
pub use event::{ChangeData, ChangeEvent, EventDetail, Image, Operation};
pub use key::ArchiveKey;
pub use sanitizer::{flatten_image, sanitize_column_name};
pub use schema::{classify, Schema};
pub use storage::{MemoryStore, ObjectStore, S3Store, StorageOp};
