//! Native client implementation - wraps domain service for in-process calls

use crate::contract::{
    AddConfigurationRequest, ConfigArtifact, ConfigEntry, IdentityKey, PublishApi, PublishError,
    PublishReceipt, UpdateConfigurationRequest,
};
use crate::domain::Service;
use async_trait::async_trait;
use std::sync::Arc;

/// Native client implementation that directly calls the domain service
#[derive(Clone)]
pub struct NativeClient {
    service: Arc<Service>,
}

impl NativeClient {
    /// Create a new native client
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PublishApi for NativeClient {
    async fn add_configuration(
        &self,
        req: AddConfigurationRequest,
    ) -> Result<PublishReceipt, PublishError> {
        self.service.add_configuration(req).await
    }

    async fn update_configuration(
        &self,
        req: UpdateConfigurationRequest,
    ) -> Result<PublishReceipt, PublishError> {
        self.service.update_configuration(req).await
    }

    async fn get_configuration(&self, config_id: i64) -> Result<ConfigEntry, PublishError> {
        self.service.get_configuration(config_id).await
    }

    async fn get_artifact(&self, identity: &IdentityKey) -> Result<ConfigArtifact, PublishError> {
        self.service.get_artifact(identity).await
    }
}
