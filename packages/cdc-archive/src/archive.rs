//! The archive transform: one change event in, at most one object-store call out.
//!
//! ```text
//! RECEIVED -> CLASSIFIED -> WRITE  -> DONE
//!                        -> DELETE -> DONE
//!          (no image)    -> DONE
//! WRITE / DELETE -> FAILED   (storage error, logged and swallowed)
//! ```
//!
//! Archival is best-effort and at-most-once. The delivery side never redelivers, so a
//! storage error is logged with full context and the invocation still completes normally.

use crate::config::ArchiveConfig;
use crate::event::{ChangeEvent, Image};
use crate::key::{key_segment, ArchiveKey};
use crate::sanitizer::flatten_image;
use crate::schema::{classify, Schema};
use crate::storage::ObjectStore;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Column injected into every archived payload.
pub const SCHEMA_COLUMN: &str = "schema";

/// Why an event carrying an image was still not archived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// `pk` is absent or not a string/number.
    MissingPk,
    /// `sk` is absent or not a string/number.
    MissingSk,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingPk => f.write_str("image has no usable pk"),
            SkipReason::MissingSk => f.write_str("image has no usable sk"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ArchiveAction {
    /// Put the payload (flattened image plus `schema`).
    Write(Image),
    /// Tombstone: remove the archived object.
    Delete,
}

impl ArchiveAction {
    pub fn name(&self) -> &'static str {
        match self {
            ArchiveAction::Write(_) => "write",
            ArchiveAction::Delete => "delete",
        }
    }
}

/// Everything needed to perform the storage call for one event.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchivePlan {
    pub source: String,
    pub schema: Schema,
    pub pk: String,
    pub sk: String,
    pub key: ArchiveKey,
    pub action: ArchiveAction,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Planned {
    /// Neither image present; nothing to do.
    Ignore,
    Skip(SkipReason),
    Dispatch(ArchivePlan),
}

/// Terminal state of one invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum ArchiveOutcome {
    Ignored,
    Skipped(SkipReason),
    Written { key: ArchiveKey, schema: Schema },
    Deleted { key: ArchiveKey, schema: Schema },
    Failed { key: ArchiveKey, schema: Schema, error: String },
}

impl ArchiveOutcome {
    pub fn key(&self) -> Option<&ArchiveKey> {
        match self {
            ArchiveOutcome::Written { key, .. }
            | ArchiveOutcome::Deleted { key, .. }
            | ArchiveOutcome::Failed { key, .. } => Some(key),
            ArchiveOutcome::Ignored | ArchiveOutcome::Skipped(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ArchiveOutcome::Failed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveOutcome::Ignored => "ignored",
            ArchiveOutcome::Skipped(_) => "skipped",
            ArchiveOutcome::Written { .. } => "written",
            ArchiveOutcome::Deleted { .. } => "deleted",
            ArchiveOutcome::Failed { .. } => "failed",
        }
    }
}

/// Classify, flatten and key an event without touching storage.
pub fn plan_event(event: &ChangeEvent) -> Planned {
    let Some(image) = event.image() else {
        return Planned::Ignore;
    };

    let Some(pk) = image.get("pk").and_then(key_segment) else {
        return Planned::Skip(SkipReason::MissingPk);
    };
    let Some(sk) = image.get("sk").and_then(key_segment) else {
        return Planned::Skip(SkipReason::MissingSk);
    };

    let schema = classify(&event.source, &pk, &sk);
    let key = ArchiveKey::derive(&event.source, schema, &pk, &sk);

    let action = if event.operation().is_remove() {
        ArchiveAction::Delete
    } else {
        let mut payload = flatten_image(image);
        payload.insert(
            SCHEMA_COLUMN.to_string(),
            Value::String(schema.as_str().to_string()),
        );
        ArchiveAction::Write(payload)
    };

    Planned::Dispatch(ArchivePlan {
        source: event.source.clone(),
        schema,
        pk,
        sk,
        key,
        action,
    })
}

/// Stateless archiver shared by all concurrent invocations.
#[derive(Clone)]
pub struct ArchiveTransform {
    config: ArchiveConfig,
    store: Arc<dyn ObjectStore>,
}

impl ArchiveTransform {
    pub fn new(config: ArchiveConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    /// Bucket the store actually writes to.
    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    /// Archive one event. Never returns an error: storage failures end in
    /// [`ArchiveOutcome::Failed`] after being logged.
    #[instrument(
        skip(self, event),
        fields(source = %event.source, operation = %event.operation())
    )]
    pub async fn archive(&self, event: &ChangeEvent) -> ArchiveOutcome {
        debug!(
            detail_type = event.detail_type.as_deref().unwrap_or("-"),
            event = ?event,
            "Received change event"
        );

        let plan = match plan_event(event) {
            Planned::Ignore => {
                debug!("Event carries no image - ignoring");
                return ArchiveOutcome::Ignored;
            }
            Planned::Skip(reason) => {
                warn!(reason = %reason, "Cannot derive archive key - skipping event");
                return ArchiveOutcome::Skipped(reason);
            }
            Planned::Dispatch(plan) => plan,
        };

        info!(
            bucket = %self.store.bucket(),
            schema = %plan.schema,
            key = %plan.key,
            pk = %plan.pk,
            sk = %plan.sk,
            action = plan.action.name(),
            "Derived archive key"
        );

        match self.dispatch(&plan).await {
            Ok(()) => match plan.action {
                ArchiveAction::Write(_) => ArchiveOutcome::Written {
                    key: plan.key,
                    schema: plan.schema,
                },
                ArchiveAction::Delete => ArchiveOutcome::Deleted {
                    key: plan.key,
                    schema: plan.schema,
                },
            },
            Err(e) => {
                error!(
                    bucket = %self.store.bucket(),
                    key = %plan.key,
                    schema = %plan.schema,
                    source = %plan.source,
                    pk = %plan.pk,
                    sk = %plan.sk,
                    action = plan.action.name(),
                    error = ?e,
                    "Archive storage call failed - event dropped"
                );
                ArchiveOutcome::Failed {
                    key: plan.key,
                    schema: plan.schema,
                    error: format!("{:#}", e),
                }
            }
        }
    }

    async fn dispatch(&self, plan: &ArchivePlan) -> Result<()> {
        match &plan.action {
            ArchiveAction::Delete => {
                self.store.delete_object(plan.key.as_str()).await?;
                debug!(key = %plan.key, "Archived object deleted");
            }
            ArchiveAction::Write(payload) => {
                debug!(payload = %serde_json::Value::Object(payload.clone()), "Flattened payload");
                let body = serde_json::to_vec(payload).context("Failed to serialize payload")?;
                self.store
                    .put_object(plan.key.as_str(), body, &self.config.content_type)
                    .await?;
                debug!(key = %plan.key, "Archived object written");
            }
        }
        Ok(())
    }
}
