//! Storage layer - database entities, repositories and the artifact feed

pub mod entity;
pub mod feed;
pub mod mapper;
pub mod migrations;
pub mod repositories;

use crate::config::Config;
use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

/// Open a pooled connection to the publish store
pub async fn connect(cfg: &Config) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(cfg.database_url.clone());
    opts.max_connections(cfg.max_connections)
        .connect_timeout(cfg.connect_timeout)
        .sqlx_logging(cfg.sqlx_logging);

    Database::connect(opts)
        .await
        .with_context(|| format!("failed to connect to publish store at {}", redact(&cfg.database_url)))
}

/// Apply pending schema migrations
pub async fn migrate(db: &DatabaseConnection) -> Result<()> {
    migrations::Migrator::up(db, None)
        .await
        .context("publish store migration failed")?;
    info!("Config publish migrations completed");
    Ok(())
}

/// Strip credentials from a connection URL before it reaches a log line
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => format!("{}://***{}", &url[..scheme], &url[at..]),
        _ => url.to_string(),
    }
}
