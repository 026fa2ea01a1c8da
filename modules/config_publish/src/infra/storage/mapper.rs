//! Entity to model mappers
//!
//! Conversions between SeaORM entities and contract models

use super::entity::{artifact, config_edit};
use crate::contract::{ConfigArtifact, ConfigEntry, ContentType, IdentityKey, PublishContext};

// ===== Artifact Conversions =====

impl TryFrom<artifact::Model> for ConfigArtifact {
    type Error = anyhow::Error;

    fn try_from(entity: artifact::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            artifact_id: entity.cfg_id,
            identity: IdentityKey {
                selectors: entity.selectors,
                optional_selectors: entity.optional_selectors,
                group: entity.cfg_group,
                key: entity.cfg_key,
            },
            version: entity.cfg_version.parse()?,
            payload: entity.raw_cfg_value,
            content_digest: entity.content_digest,
            created_at: entity.time_created,
            updated_at: entity.time_updated,
            sequence: entity.sequence,
        })
    }
}

// ===== Configuration Row Conversions =====

impl TryFrom<config_edit::Model> for ConfigEntry {
    type Error = anyhow::Error;

    fn try_from(entity: config_edit::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            config_id: entity.config_id,
            context: PublishContext::new(entity.cfg_app, entity.cfg_env, entity.cfg_dc),
            namespace: entity.cfg_namespace,
            key: entity.cfg_key,
            content_type: ContentType::parse(&entity.content_type)?,
            content: entity.content,
            version: entity.cfg_version.parse()?,
            status: entity.cfg_status,
            created_at: entity.time_created,
            updated_at: entity.time_updated,
        })
    }
}

impl From<&ConfigEntry> for config_edit::ActiveModel {
    fn from(model: &ConfigEntry) -> Self {
        use sea_orm::ActiveValue::*;

        Self {
            config_id: NotSet,
            cfg_app: Set(model.context.app.clone()),
            cfg_env: Set(model.context.env.clone()),
            cfg_dc: Set(model.context.dc.clone()),
            cfg_namespace: Set(model.namespace.clone()),
            cfg_key: Set(model.key.clone()),
            content_type: Set(model.content_type.as_str().to_string()),
            content: Set(model.content.clone()),
            cfg_version: Set(model.version.to_string()),
            cfg_status: Set(model.status),
            time_created: Set(model.created_at),
            time_updated: Set(model.updated_at),
        }
    }
}
