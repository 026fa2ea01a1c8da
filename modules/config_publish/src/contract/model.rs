//! Contract models for the publish module
//!
//! These models are transport-agnostic and used for inter-module communication.

use super::error::PublishError;
use super::selectors::Selectors;
use super::version::VersionTag;
use chrono::{DateTime, Utc};
use std::fmt;

/// Content type of an edited configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Opaque bytes delivered as-is
    General,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::General => "general",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PublishError> {
        match s {
            "general" => Ok(ContentType::General),
            other => Err(PublishError::UnsupportedContentType {
                content_type: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved owner context of an edit (application, environment, datacenter)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishContext {
    pub app: String,
    pub env: String,
    pub dc: String,
}

impl PublishContext {
    pub fn new(app: impl Into<String>, env: impl Into<String>, dc: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            env: env.into(),
            dc: dc.into(),
        }
    }

    /// Selector map routing the artifact to consumers of this context
    pub fn selectors(&self) -> Result<Selectors, PublishError> {
        let mut selectors = Selectors::new();
        for (dimension, value) in [("app", &self.app), ("env", &self.env), ("dc", &self.dc)] {
            selectors
                .insert(dimension, value.as_str())
                .map_err(|e| PublishError::validation(e.to_string()))?;
        }
        Ok(selectors)
    }
}

/// Identity of one live artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub selectors: String,
    pub optional_selectors: String,
    pub group: String,
    pub key: String,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}/{}/{}",
            self.selectors, self.optional_selectors, self.group, self.key
        )
    }
}

/// Durable wire record for one configuration identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigArtifact {
    pub artifact_id: i64,
    pub identity: IdentityKey,
    pub version: VersionTag,
    /// Encoded [`super::WireConfiguration`]
    pub payload: Vec<u8>,
    /// `sha256:<hex>` of the raw content
    pub content_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Store-generated change counter, advanced on every successful write
    pub sequence: i64,
}

/// Editor-facing configuration row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub config_id: i64,
    pub context: PublishContext,
    pub namespace: String,
    pub key: String,
    pub content_type: ContentType,
    pub content: Vec<u8>,
    pub version: VersionTag,
    pub status: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to publish a new configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddConfigurationRequest {
    pub context: PublishContext,
    pub namespace: String,
    pub key: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Request to replace the content of an existing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfigurationRequest {
    pub config_id: i64,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Outcome of a committed edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub config_id: i64,
    pub version: VersionTag,
    pub artifact_id: i64,
    /// Whether the artifact row was created by this edit
    pub created: bool,
    /// Guarded-update attempts spent
    pub attempts: usize,
}
