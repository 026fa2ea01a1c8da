//! Domain service - edit transaction orchestration

use super::coordinator::PublishCoordinator;
use super::record::ConfigRecordBuilder;
use super::repository::{ConfigureRepository, InsertOutcome, PushChangeRepository};
use super::sequencer::VersionSequencer;
use crate::contract::error::store_error;
use crate::contract::{
    AddConfigurationRequest, ConfigArtifact, ConfigEntry, ContentType, IdentityKey,
    PublishContext, PublishError, PublishReceipt, UpdateConfigurationRequest,
};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::sync::Arc;
use tracing::{info, warn};

/// Domain service for configuration publishing
pub struct Service {
    db: Arc<DatabaseConnection>,
    configure_repo: Arc<dyn ConfigureRepository>,
    push_repo: Arc<dyn PushChangeRepository>,
    sequencer: VersionSequencer,
    coordinator: PublishCoordinator,
}

impl Service {
    /// Create a new service instance
    pub fn new(
        db: Arc<DatabaseConnection>,
        configure_repo: Arc<dyn ConfigureRepository>,
        push_repo: Arc<dyn PushChangeRepository>,
    ) -> Self {
        Self {
            db,
            sequencer: VersionSequencer::new(configure_repo.clone()),
            coordinator: PublishCoordinator::new(push_repo.clone()),
            configure_repo,
            push_repo,
        }
    }

    // ===== Edit Operations =====

    /// Create a configuration and publish its first artifact in one transaction
    pub async fn add_configuration(
        &self,
        req: AddConfigurationRequest,
    ) -> Result<PublishReceipt, PublishError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        let result = self.add_in(&txn, req).await;
        finish(txn, result).await
    }

    /// Replace a configuration's content and republish in one transaction
    pub async fn update_configuration(
        &self,
        req: UpdateConfigurationRequest,
    ) -> Result<PublishReceipt, PublishError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        let result = self.update_in(&txn, req).await;
        finish(txn, result).await
    }

    /// Get a configuration row
    pub async fn get_configuration(&self, config_id: i64) -> Result<ConfigEntry, PublishError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        let result = self.load_entry(&txn, config_id).await;
        finish(txn, result).await
    }

    /// Get the live artifact for an identity
    pub async fn get_artifact(&self, identity: &IdentityKey) -> Result<ConfigArtifact, PublishError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        let result = self
            .push_repo
            .find_artifact(&txn, identity)
            .await
            .map_err(store_error)
            .and_then(|found| {
                found.ok_or_else(|| PublishError::NotFound {
                    resource: "artifact".to_string(),
                    id: identity.to_string(),
                })
            });
        finish(txn, result).await
    }

    // ===== Transaction Bodies =====

    async fn add_in(
        &self,
        txn: &DatabaseTransaction,
        req: AddConfigurationRequest,
    ) -> Result<PublishReceipt, PublishError> {
        let content_type = ContentType::parse(&req.content_type)?;
        require_non_empty("namespace", &req.namespace)?;
        require_non_empty("key", &req.key)?;
        // Fails early on selector values the canonical string cannot carry.
        req.context.selectors()?;

        self.push_repo.lock_for_edit(txn).await.map_err(store_error)?;
        if self
            .configure_repo
            .exists_entry(txn, &req.context, &req.namespace, &req.key)
            .await
            .map_err(store_error)?
        {
            return Err(scope_conflict(&req.context, &req.namespace, &req.key));
        }

        let now = chrono::Utc::now();
        let mut entry = ConfigEntry {
            config_id: 0,
            context: req.context,
            namespace: req.namespace,
            key: req.key,
            content_type,
            content: req.content,
            version: self.sequencer.next_tag(txn).await?,
            status: 0,
            created_at: now,
            updated_at: now,
        };
        entry.config_id = match self
            .configure_repo
            .insert_entry(txn, &entry)
            .await
            .map_err(store_error)?
        {
            InsertOutcome::Inserted(config_id) => config_id,
            InsertOutcome::AlreadyExists => {
                return Err(scope_conflict(&entry.context, &entry.namespace, &entry.key));
            }
        };

        self.publish(txn, &entry).await
    }

    async fn update_in(
        &self,
        txn: &DatabaseTransaction,
        req: UpdateConfigurationRequest,
    ) -> Result<PublishReceipt, PublishError> {
        self.push_repo.lock_for_edit(txn).await.map_err(store_error)?;
        let mut entry = self.load_entry(txn, req.config_id).await?;
        entry.content_type = ContentType::parse(&req.content_type)?;
        entry.content = req.content;
        entry.version = self.sequencer.next_tag(txn).await?;
        entry.updated_at = chrono::Utc::now();

        self.configure_repo
            .update_entry(txn, &entry)
            .await
            .map_err(store_error)?;

        self.publish(txn, &entry).await
    }

    async fn publish(
        &self,
        txn: &DatabaseTransaction,
        entry: &ConfigEntry,
    ) -> Result<PublishReceipt, PublishError> {
        let record = ConfigRecordBuilder::build(entry, entry.updated_at)?;
        let outcome = self.coordinator.apply_change(txn, &record).await?;

        info!(
            config_id = entry.config_id,
            artifact_id = outcome.artifact_id,
            group = %entry.namespace,
            key = %entry.key,
            version = %entry.version,
            created = outcome.created,
            "configuration change applied"
        );

        Ok(PublishReceipt {
            config_id: entry.config_id,
            version: entry.version,
            artifact_id: outcome.artifact_id,
            created: outcome.created,
            attempts: outcome.attempts,
        })
    }

    // ===== Helper Methods =====

    async fn load_entry(
        &self,
        txn: &DatabaseTransaction,
        config_id: i64,
    ) -> Result<ConfigEntry, PublishError> {
        self.configure_repo
            .find_entry(txn, config_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| PublishError::NotFound {
                resource: "configuration".to_string(),
                id: config_id.to_string(),
            })
    }
}

/// Commit on success, roll back on error. A transaction dropped mid-flight
/// (panic, cancellation) is rolled back by the driver.
async fn finish<T>(
    txn: DatabaseTransaction,
    result: Result<T, PublishError>,
) -> Result<T, PublishError> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(store_error)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = txn.rollback().await {
                warn!(error = %rollback, "rollback failed after publish error");
            }
            Err(err)
        }
    }
}

fn scope_conflict(context: &PublishContext, namespace: &str, key: &str) -> PublishError {
    PublishError::Conflict {
        reason: format!(
            "configuration exists: {}/{}/{}/{}/{}",
            context.app, context.env, context.dc, namespace, key
        ),
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), PublishError> {
    if value.trim().is_empty() {
        return Err(PublishError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}
