//! Repository traits for data access
//!
//! Every call runs on the caller's transaction so an edit row and its
//! artifact commit or roll back together. Implementations are in
//! infra/storage/repositories.rs

use crate::contract::{ConfigArtifact, ConfigEntry, IdentityKey, PublishContext};
use crate::domain::record::ArtifactRecord;
use anyhow::Result;
use async_trait::async_trait;
use sea_orm::DatabaseTransaction;

/// Result of inserting a row under a unique key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row created; carries the generated id
    Inserted(i64),
    /// Another transaction created the same key first
    AlreadyExists,
}

/// Repository for published artifacts
#[async_trait]
pub trait PushChangeRepository: Send + Sync {
    /// Serialize the edit against other writers before it reads anything.
    /// Backends whose guarded update carries its own lock need nothing here.
    async fn lock_for_edit(&self, _txn: &DatabaseTransaction) -> Result<()> {
        Ok(())
    }

    /// Find the live artifact for an identity
    async fn find_artifact(
        &self,
        txn: &DatabaseTransaction,
        identity: &IdentityKey,
    ) -> Result<Option<ConfigArtifact>>;

    /// Insert a new artifact with sequence 0
    async fn insert_artifact(
        &self,
        txn: &DatabaseTransaction,
        record: &ArtifactRecord,
    ) -> Result<InsertOutcome>;

    /// Advance the sequence of a row inserted by this transaction.
    /// `false` means the publish lock was not obtained.
    async fn bump_sequence(&self, txn: &DatabaseTransaction, artifact_id: i64) -> Result<bool>;

    /// Rewrite version, payload and digest of an existing artifact and
    /// advance its sequence. `None` means the publish lock was not obtained.
    async fn update_artifact(
        &self,
        txn: &DatabaseTransaction,
        record: &ArtifactRecord,
    ) -> Result<Option<i64>>;
}

/// Repository for editor-facing configuration rows
#[async_trait]
pub trait ConfigureRepository: Send + Sync {
    /// Next value of the store-wide version counter
    async fn next_version_seq(&self, txn: &DatabaseTransaction) -> Result<i64>;

    /// Check whether a configuration already exists for a context
    async fn exists_entry(
        &self,
        txn: &DatabaseTransaction,
        context: &PublishContext,
        namespace: &str,
        key: &str,
    ) -> Result<bool>;

    /// Find a configuration row by id
    async fn find_entry(&self, txn: &DatabaseTransaction, config_id: i64)
        -> Result<Option<ConfigEntry>>;

    /// Insert a configuration row; a row already holding the same scope
    /// is reported as `AlreadyExists`
    async fn insert_entry(
        &self,
        txn: &DatabaseTransaction,
        entry: &ConfigEntry,
    ) -> Result<InsertOutcome>;

    /// Persist content, type, version and timestamps of a row
    async fn update_entry(&self, txn: &DatabaseTransaction, entry: &ConfigEntry) -> Result<()>;
}
