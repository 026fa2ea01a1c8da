//! Exactly-once artifact publication under concurrent editors

use super::record::ArtifactRecord;
use super::repository::{InsertOutcome, PushChangeRepository};
use crate::contract::error::store_error;
use crate::contract::PublishError;
use sea_orm::DatabaseTransaction;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bound on guarded update attempts per edit
pub const MAX_APPLY_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub artifact_id: i64,
    /// Row was inserted by this call
    pub created: bool,
    pub attempts: usize,
}

/// Inserts or updates the artifact for an edit inside the edit's transaction
#[derive(Clone)]
pub struct PublishCoordinator {
    repo: Arc<dyn PushChangeRepository>,
}

impl PublishCoordinator {
    pub fn new(repo: Arc<dyn PushChangeRepository>) -> Self {
        Self { repo }
    }

    /// Publish `record`, advancing the artifact's sequence exactly once.
    ///
    /// The existence check happens once: a duplicate identity cannot be
    /// inserted, so a lost insert race is treated as "exists" and takes the
    /// full-update branch. Only a lost publish lock is retried; store
    /// failures abort immediately.
    pub async fn apply_change(
        &self,
        txn: &DatabaseTransaction,
        record: &ArtifactRecord,
    ) -> Result<ApplyOutcome, PublishError> {
        let existing = self
            .repo
            .find_artifact(txn, &record.identity)
            .await
            .map_err(store_error)?;

        let inserted = match existing {
            Some(_) => None,
            None => match self.repo.insert_artifact(txn, record).await.map_err(store_error)? {
                InsertOutcome::Inserted(id) => Some(id),
                InsertOutcome::AlreadyExists => {
                    debug!(identity = %record.identity, "artifact created concurrently, updating instead");
                    None
                }
            },
        };

        for attempt in 1..=MAX_APPLY_ATTEMPTS {
            let applied = match inserted {
                Some(id) => self
                    .repo
                    .bump_sequence(txn, id)
                    .await
                    .map_err(store_error)?
                    .then_some(id),
                None => self
                    .repo
                    .update_artifact(txn, record)
                    .await
                    .map_err(store_error)?,
            };

            if let Some(artifact_id) = applied {
                debug!(artifact_id, attempt, version = %record.version, "artifact published");
                return Ok(ApplyOutcome {
                    artifact_id,
                    created: inserted.is_some(),
                    attempts: attempt,
                });
            }
            debug!(identity = %record.identity, attempt, "publish lock contended, retrying");
        }

        warn!(
            identity = %record.identity,
            attempts = MAX_APPLY_ATTEMPTS,
            "maximum retry exceeded while applying configuration change"
        );
        Err(PublishError::RetryExhausted {
            attempts: MAX_APPLY_ATTEMPTS,
        })
    }
}
