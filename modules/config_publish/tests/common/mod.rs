//! Common test utilities: an in-memory store and edit fixtures

#![allow(dead_code)]

use chrono::Utc;
use config_publish::domain::ArtifactRecord;
use config_publish::domain::ConfigRecordBuilder;
use config_publish::infra::storage;
use config_publish::{
    AddConfigurationRequest, ConfigEntry, ContentType, IdentityKey, PublishContext, VersionTag,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use tempfile::TempDir;

/// In-memory SQLite store with the real migrations applied.
///
/// Every pooled connection to `sqlite::memory:` opens its own database, so
/// the pool is pinned to a single connection.
pub async fn migrated_store() -> Arc<DatabaseConnection> {
    let db = bare_store().await;
    storage::migrate(&db).await.expect("migrations should apply");
    Arc::new(db)
}

/// File-backed SQLite store shared by `connections` pooled connections, so
/// concurrent edits really run in parallel transactions
pub async fn file_store(dir: &TempDir, connections: u32) -> Arc<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("publish.db").display());
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(connections).sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("file sqlite should open");
    storage::migrate(&db).await.expect("migrations should apply");
    Arc::new(db)
}

/// In-memory SQLite connection without schema, for tests that only need a
/// transaction handle
pub async fn bare_store() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    Database::connect(opts)
        .await
        .expect("in-memory sqlite should open")
}

pub fn billing_context() -> PublishContext {
    PublishContext::new("billing", "prod", "eu1")
}

pub fn add_request(namespace: &str, key: &str, content: &[u8]) -> AddConfigurationRequest {
    AddConfigurationRequest {
        context: billing_context(),
        namespace: namespace.to_string(),
        key: key.to_string(),
        content_type: "general".to_string(),
        content: content.to_vec(),
    }
}

pub fn billing_identity(group: &str, key: &str) -> IdentityKey {
    IdentityKey {
        selectors: "app=billing,dc=eu1,env=prod".to_string(),
        optional_selectors: String::new(),
        group: group.to_string(),
        key: key.to_string(),
    }
}

/// Built artifact for an edit that never touched a store
pub fn record(group: &str, key: &str, version: u64, content: &[u8]) -> ArtifactRecord {
    let now = Utc::now();
    let entry = ConfigEntry {
        config_id: 1,
        context: billing_context(),
        namespace: group.to_string(),
        key: key.to_string(),
        content_type: ContentType::General,
        content: content.to_vec(),
        version: VersionTag::format(version),
        status: 0,
        created_at: now,
        updated_at: now,
    };
    ConfigRecordBuilder::build(&entry, now).expect("record should build")
}

pub fn print_test_header(test_name: &str, purpose: &str) {
    println!("\n🧪 TEST: {}", test_name);
    println!("📋 PURPOSE: {}", purpose);
}
