//! Module wiring - builds the publish service and its read side over one store

use crate::api::native::NativeClient;
use crate::config::Config;
use crate::contract::PublishApi;
use crate::domain::Service;
use crate::infra::storage::{
    self,
    feed::ArtifactFeed,
    repositories::{SeaOrmConfigureRepository, SeaOrmPushChangeRepository},
};
use anyhow::Result;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Config publish module
#[derive(Clone)]
pub struct PublishModule {
    db: Arc<DatabaseConnection>,
    service: Arc<Service>,
}

impl PublishModule {
    /// Connect to the store described by `cfg`, optionally applying migrations
    pub async fn init(cfg: &Config, run_migrations: bool) -> Result<Self> {
        let db = storage::connect(cfg).await?;
        if run_migrations {
            storage::migrate(&db).await?;
        }
        Ok(Self::from_connection(Arc::new(db)))
    }

    /// Wire the module over an existing connection
    pub fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        let configure_repo = Arc::new(SeaOrmConfigureRepository::new());
        let push_repo = Arc::new(SeaOrmPushChangeRepository::new());
        let service = Arc::new(Service::new(db.clone(), configure_repo, push_repo));

        tracing::info!("Config publish module initialized");
        Self { db, service }
    }

    /// In-process client for edit operations
    pub fn client(&self) -> Arc<dyn PublishApi> {
        Arc::new(NativeClient::new(self.service.clone()))
    }

    /// Read side for pollers
    pub fn feed(&self) -> ArtifactFeed {
        ArtifactFeed::new(self.db.clone())
    }

    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.db.clone()
    }
}
