//! Database migrations for the publish store

use sea_orm_migration::prelude::*;
use sea_orm_migration::MigrationName;

/// Counter feeding version tags
pub const VERSION_SEQUENCE: &str = "cfg_version_seq";
/// Counter feeding artifact sequences
pub const ARTIFACT_SEQUENCE: &str = "cfg_seq";
/// Mutual-exclusion row guarding artifact updates
pub const PUBLISH_LOCK_NAME: &str = "config_publish";

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_configuration::Migration),
            Box::new(m20250301_000002_create_config_edit::Migration),
            Box::new(m20250301_000003_create_publish_primitives::Migration),
        ]
    }
}

mod m20250301_000001_create_configuration {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_configuration"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Configuration::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Configuration::CfgId)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Configuration::Selectors).string().not_null())
                        .col(
                            ColumnDef::new(Configuration::OptionalSelectors)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(Configuration::CfgGroup).string().not_null())
                        .col(ColumnDef::new(Configuration::CfgKey).string().not_null())
                        .col(ColumnDef::new(Configuration::CfgVersion).string().not_null())
                        .col(ColumnDef::new(Configuration::RawCfgValue).blob().not_null())
                        .col(ColumnDef::new(Configuration::ContentDigest).string().not_null())
                        .col(
                            ColumnDef::new(Configuration::CfgStatus)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Configuration::TimeCreated)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Configuration::TimeUpdated)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Configuration::Sequence)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            // At most one live artifact per identity
            manager
                .create_index(
                    Index::create()
                        .name("uidx_configuration_identity")
                        .table(Configuration::Table)
                        .col(Configuration::Selectors)
                        .col(Configuration::OptionalSelectors)
                        .col(Configuration::CfgGroup)
                        .col(Configuration::CfgKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_configuration_sequence")
                        .table(Configuration::Table)
                        .col(Configuration::Sequence)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Configuration::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Configuration {
        Table,
        CfgId,
        Selectors,
        OptionalSelectors,
        CfgGroup,
        CfgKey,
        CfgVersion,
        RawCfgValue,
        ContentDigest,
        CfgStatus,
        TimeCreated,
        TimeUpdated,
        Sequence,
    }
}

mod m20250301_000002_create_config_edit {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_config_edit"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ConfigEdit::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConfigEdit::ConfigId)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ConfigEdit::CfgApp).string().not_null())
                        .col(ColumnDef::new(ConfigEdit::CfgEnv).string().not_null())
                        .col(ColumnDef::new(ConfigEdit::CfgDc).string().not_null())
                        .col(ColumnDef::new(ConfigEdit::CfgNamespace).string().not_null())
                        .col(ColumnDef::new(ConfigEdit::CfgKey).string().not_null())
                        .col(ColumnDef::new(ConfigEdit::ContentType).string().not_null())
                        .col(ColumnDef::new(ConfigEdit::Content).blob().not_null())
                        .col(ColumnDef::new(ConfigEdit::CfgVersion).string().not_null())
                        .col(
                            ColumnDef::new(ConfigEdit::CfgStatus)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConfigEdit::TimeCreated)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConfigEdit::TimeUpdated)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uidx_config_edit_scope")
                        .table(ConfigEdit::Table)
                        .col(ConfigEdit::CfgApp)
                        .col(ConfigEdit::CfgEnv)
                        .col(ConfigEdit::CfgDc)
                        .col(ConfigEdit::CfgNamespace)
                        .col(ConfigEdit::CfgKey)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConfigEdit::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ConfigEdit {
        Table,
        ConfigId,
        CfgApp,
        CfgEnv,
        CfgDc,
        CfgNamespace,
        CfgKey,
        ContentType,
        Content,
        CfgVersion,
        CfgStatus,
        TimeCreated,
        TimeUpdated,
    }
}

/// Counters and the publish mutex. PostgreSQL gets native sequences (the
/// mutex is an advisory lock there); other backends get counter and lock
/// rows updated inside the edit transaction.
mod m20250301_000003_create_publish_primitives {
    use super::*;
    use sea_orm_migration::sea_orm::{ConnectionTrait, DbBackend};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_publish_primitives"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let backend = manager.get_database_backend();
            let conn = manager.get_connection();

            if backend == DbBackend::Postgres {
                for sequence in [VERSION_SEQUENCE, ARTIFACT_SEQUENCE] {
                    conn.execute_unprepared(&format!("CREATE SEQUENCE IF NOT EXISTS {sequence}"))
                        .await?;
                }
                return Ok(());
            }

            manager
                .create_table(
                    Table::create()
                        .table(SequenceCounter::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SequenceCounter::Name)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(SequenceCounter::Current)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PublishLock::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PublishLock::Name)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PublishLock::AcquiredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            let counters = Query::insert()
                .into_table(SequenceCounter::Table)
                .columns([SequenceCounter::Name, SequenceCounter::Current])
                .values_panic([VERSION_SEQUENCE.into(), 0i64.into()])
                .values_panic([ARTIFACT_SEQUENCE.into(), 0i64.into()])
                .to_owned();
            conn.execute(backend.build(&counters)).await?;

            let lock = Query::insert()
                .into_table(PublishLock::Table)
                .columns([PublishLock::Name, PublishLock::AcquiredAt])
                .values_panic([PUBLISH_LOCK_NAME.into(), chrono::Utc::now().into()])
                .to_owned();
            conn.execute(backend.build(&lock)).await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            if manager.get_database_backend() == DbBackend::Postgres {
                for sequence in [VERSION_SEQUENCE, ARTIFACT_SEQUENCE] {
                    manager
                        .get_connection()
                        .execute_unprepared(&format!("DROP SEQUENCE IF EXISTS {sequence}"))
                        .await?;
                }
                return Ok(());
            }
            manager
                .drop_table(Table::drop().table(PublishLock::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SequenceCounter::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SequenceCounter {
        Table,
        Name,
        Current,
    }

    #[derive(DeriveIden)]
    enum PublishLock {
        Table,
        Name,
        AcquiredAt,
    }
}
