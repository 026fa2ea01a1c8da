//! SeaORM repository implementations

use crate::contract::{ConfigArtifact, ConfigEntry, IdentityKey, PublishContext};
use crate::domain::record::ArtifactRecord;
use crate::domain::repository::{ConfigureRepository, InsertOutcome, PushChangeRepository};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    prelude::Expr, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    DbBackend, EntityTrait, PaginatorTrait, QueryFilter, SqlErr, Statement, TransactionTrait,
    UpdateMany,
};

use super::entity::{artifact, config_edit, publish_lock, sequence_counter};
use super::migrations::{ARTIFACT_SEQUENCE, PUBLISH_LOCK_NAME, VERSION_SEQUENCE};

/// Advisory lock key scoped to the publish subsystem (PostgreSQL)
pub const PUBLISH_ADVISORY_KEY: i64 = -1000;

// ===== Store Primitives =====

/// Next value of a named counter within the caller's transaction
async fn next_sequence_value(txn: &DatabaseTransaction, name: &str) -> Result<i64> {
    match txn.get_database_backend() {
        DbBackend::Postgres => {
            let row = txn
                .query_one(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    "SELECT nextval($1::regclass) AS value",
                    [name.into()],
                ))
                .await?
                .ok_or_else(|| anyhow!("sequence {name} returned no row"))?;
            Ok(row.try_get::<i64>("", "value")?)
        }
        _ => {
            let bumped = sequence_counter::Entity::update_many()
                .col_expr(
                    sequence_counter::Column::Current,
                    Expr::col(sequence_counter::Column::Current).add(1),
                )
                .filter(sequence_counter::Column::Name.eq(name))
                .exec(txn)
                .await?;
            if bumped.rows_affected == 0 {
                bail!("sequence counter {name} is missing");
            }
            let counter = sequence_counter::Entity::find_by_id(name.to_string())
                .one(txn)
                .await?
                .ok_or_else(|| anyhow!("sequence counter {name} is missing"))?;
            Ok(counter.current)
        }
    }
}

/// Touch the publish mutex row, write-locking the store for the rest of the
/// transaction on backends without advisory locks. Zero means the row is
/// missing.
async fn touch_publish_lock(txn: &DatabaseTransaction) -> Result<u64> {
    let touched = publish_lock::Entity::update_many()
        .col_expr(
            publish_lock::Column::AcquiredAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(publish_lock::Column::Name.eq(PUBLISH_LOCK_NAME))
        .exec(txn)
        .await?;
    Ok(touched.rows_affected)
}

/// Value assigned to an artifact's sequence column. PostgreSQL draws it
/// inside the guarded statement, so a lost lock consumes nothing; other
/// backends advance the counter row up front.
async fn artifact_sequence(txn: &DatabaseTransaction) -> Result<SimpleExpr> {
    match txn.get_database_backend() {
        DbBackend::Postgres => Ok(native_next_value(ARTIFACT_SEQUENCE)),
        _ => Ok(Expr::value(
            next_sequence_value(txn, ARTIFACT_SEQUENCE).await?,
        )),
    }
}

fn native_next_value(sequence: &str) -> SimpleExpr {
    Expr::cust(format!("nextval('{sequence}')"))
}

/// Fold the transaction-scoped advisory try-lock into the predicate, so a
/// contended lock yields zero rows
fn advisory_guarded(update: UpdateMany<artifact::Entity>) -> UpdateMany<artifact::Entity> {
    update.filter(Expr::cust(format!(
        "pg_try_advisory_xact_lock({PUBLISH_ADVISORY_KEY})"
    )))
}

/// Run an artifact update only while holding the publish mutex; returns the
/// affected row count. Locks are released at commit/rollback.
async fn guarded_update(
    txn: &DatabaseTransaction,
    update: UpdateMany<artifact::Entity>,
) -> Result<u64> {
    let update = match txn.get_database_backend() {
        DbBackend::Postgres => advisory_guarded(update),
        _ => {
            if touch_publish_lock(txn).await? == 0 {
                return Ok(0);
            }
            update
        }
    };
    Ok(update.exec(txn).await?.rows_affected)
}

// ===== Push Change Repository =====

#[derive(Default)]
pub struct SeaOrmPushChangeRepository;

impl SeaOrmPushChangeRepository {
    pub fn new() -> Self {
        Self
    }

    async fn find_model(
        txn: &DatabaseTransaction,
        identity: &IdentityKey,
    ) -> Result<Option<artifact::Model>> {
        Ok(artifact::Entity::find()
            .filter(artifact::Column::Selectors.eq(identity.selectors.as_str()))
            .filter(artifact::Column::OptionalSelectors.eq(identity.optional_selectors.as_str()))
            .filter(artifact::Column::CfgGroup.eq(identity.group.as_str()))
            .filter(artifact::Column::CfgKey.eq(identity.key.as_str()))
            .one(txn)
            .await?)
    }
}

#[async_trait]
impl PushChangeRepository for SeaOrmPushChangeRepository {
    async fn lock_for_edit(&self, txn: &DatabaseTransaction) -> Result<()> {
        // A SQLite transaction that reads before writing cannot wait for
        // the write lock, so the lock must be the first statement.
        if txn.get_database_backend() == DbBackend::Postgres {
            return Ok(());
        }
        if touch_publish_lock(txn).await? == 0 {
            bail!("publish lock {PUBLISH_LOCK_NAME} is missing");
        }
        Ok(())
    }

    async fn find_artifact(
        &self,
        txn: &DatabaseTransaction,
        identity: &IdentityKey,
    ) -> Result<Option<ConfigArtifact>> {
        Self::find_model(txn, identity)
            .await?
            .map(ConfigArtifact::try_from)
            .transpose()
    }

    async fn insert_artifact(
        &self,
        txn: &DatabaseTransaction,
        record: &ArtifactRecord,
    ) -> Result<InsertOutcome> {
        let active = artifact::ActiveModel {
            selectors: Set(record.identity.selectors.clone()),
            optional_selectors: Set(record.identity.optional_selectors.clone()),
            cfg_group: Set(record.identity.group.clone()),
            cfg_key: Set(record.identity.key.clone()),
            cfg_version: Set(record.version.to_string()),
            raw_cfg_value: Set(record.payload.clone()),
            content_digest: Set(record.content_digest.clone()),
            cfg_status: Set(0),
            time_created: Set(record.built_at),
            time_updated: Set(record.built_at),
            sequence: Set(0),
            ..Default::default()
        };

        // A duplicate-key failure would poison the outer transaction on
        // PostgreSQL, so the insert runs inside a savepoint.
        let savepoint = txn.begin().await?;
        match artifact::Entity::insert(active).exec(&savepoint).await {
            Ok(inserted) => {
                savepoint.commit().await?;
                Ok(InsertOutcome::Inserted(inserted.last_insert_id))
            }
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                savepoint.rollback().await?;
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn bump_sequence(&self, txn: &DatabaseTransaction, artifact_id: i64) -> Result<bool> {
        let sequence = artifact_sequence(txn).await?;
        let update = artifact::Entity::update_many()
            .col_expr(artifact::Column::TimeUpdated, Expr::value(chrono::Utc::now()))
            .col_expr(artifact::Column::Sequence, sequence)
            .filter(artifact::Column::CfgId.eq(artifact_id));
        Ok(guarded_update(txn, update).await? > 0)
    }

    async fn update_artifact(
        &self,
        txn: &DatabaseTransaction,
        record: &ArtifactRecord,
    ) -> Result<Option<i64>> {
        let existing = Self::find_model(txn, &record.identity)
            .await?
            .ok_or_else(|| anyhow!("configuration not found: {}", record.identity))?;

        let sequence = artifact_sequence(txn).await?;
        let update = artifact::Entity::update_many()
            .col_expr(artifact::Column::CfgVersion, Expr::value(record.version.to_string()))
            .col_expr(artifact::Column::RawCfgValue, Expr::value(record.payload.clone()))
            .col_expr(
                artifact::Column::ContentDigest,
                Expr::value(record.content_digest.clone()),
            )
            .col_expr(artifact::Column::TimeUpdated, Expr::value(record.built_at))
            .col_expr(artifact::Column::Sequence, sequence)
            .filter(artifact::Column::CfgId.eq(existing.cfg_id));

        let affected = guarded_update(txn, update).await?;
        Ok((affected > 0).then_some(existing.cfg_id))
    }
}

// ===== Configure Repository =====

#[derive(Default)]
pub struct SeaOrmConfigureRepository;

impl SeaOrmConfigureRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfigureRepository for SeaOrmConfigureRepository {
    async fn next_version_seq(&self, txn: &DatabaseTransaction) -> Result<i64> {
        next_sequence_value(txn, VERSION_SEQUENCE).await
    }

    async fn exists_entry(
        &self,
        txn: &DatabaseTransaction,
        context: &PublishContext,
        namespace: &str,
        key: &str,
    ) -> Result<bool> {
        let count = config_edit::Entity::find()
            .filter(config_edit::Column::CfgApp.eq(context.app.as_str()))
            .filter(config_edit::Column::CfgEnv.eq(context.env.as_str()))
            .filter(config_edit::Column::CfgDc.eq(context.dc.as_str()))
            .filter(config_edit::Column::CfgNamespace.eq(namespace))
            .filter(config_edit::Column::CfgKey.eq(key))
            .count(txn)
            .await?;

        Ok(count > 0)
    }

    async fn find_entry(
        &self,
        txn: &DatabaseTransaction,
        config_id: i64,
    ) -> Result<Option<ConfigEntry>> {
        config_edit::Entity::find_by_id(config_id)
            .one(txn)
            .await?
            .map(ConfigEntry::try_from)
            .transpose()
    }

    async fn insert_entry(
        &self,
        txn: &DatabaseTransaction,
        entry: &ConfigEntry,
    ) -> Result<InsertOutcome> {
        let active: config_edit::ActiveModel = entry.into();
        match config_edit::Entity::insert(active).exec(txn).await {
            Ok(inserted) => Ok(InsertOutcome::Inserted(inserted.last_insert_id)),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_entry(&self, txn: &DatabaseTransaction, entry: &ConfigEntry) -> Result<()> {
        let updated = config_edit::Entity::update_many()
            .col_expr(
                config_edit::Column::ContentType,
                Expr::value(entry.content_type.as_str()),
            )
            .col_expr(config_edit::Column::Content, Expr::value(entry.content.clone()))
            .col_expr(config_edit::Column::CfgVersion, Expr::value(entry.version.to_string()))
            .col_expr(config_edit::Column::TimeUpdated, Expr::value(entry.updated_at))
            .filter(config_edit::Column::ConfigId.eq(entry.config_id))
            .exec(txn)
            .await?;

        if updated.rows_affected == 0 {
            bail!("configuration {} vanished during update", entry.config_id);
        }
        Ok(())
    }
}
