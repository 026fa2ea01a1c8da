//! Native client trait for inter-module communication
//!
//! This trait defines the API that other modules use to publish configuration.
//! NO HTTP - direct function calls.

use super::{
    error::PublishError,
    model::{
        AddConfigurationRequest, ConfigArtifact, ConfigEntry, IdentityKey, PublishReceipt,
        UpdateConfigurationRequest,
    },
};
use async_trait::async_trait;

/// Publish API for inter-module communication
#[async_trait]
pub trait PublishApi: Send + Sync {
    /// Create a configuration and publish its first artifact
    async fn add_configuration(
        &self,
        req: AddConfigurationRequest,
    ) -> Result<PublishReceipt, PublishError>;

    /// Replace a configuration's content and republish
    async fn update_configuration(
        &self,
        req: UpdateConfigurationRequest,
    ) -> Result<PublishReceipt, PublishError>;

    /// Get an editor-facing configuration row
    async fn get_configuration(&self, config_id: i64) -> Result<ConfigEntry, PublishError>;

    /// Get the live artifact for an identity
    async fn get_artifact(&self, identity: &IdentityKey) -> Result<ConfigArtifact, PublishError>;
}
