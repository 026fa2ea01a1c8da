//! Canonical artifact construction

use crate::contract::{
    ConfigEntry, ContentType, IdentityKey, PublishError, Selectors, VersionTag, WireConfiguration,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Everything the store needs to insert or rewrite an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub identity: IdentityKey,
    pub version: VersionTag,
    pub payload: Vec<u8>,
    pub content_digest: String,
    pub built_at: DateTime<Utc>,
}

/// `sha256:<hex>` digest of raw content
pub fn content_digest(content: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(content)))
}

/// Pure transformation from an edit row to its wire artifact
pub struct ConfigRecordBuilder;

impl ConfigRecordBuilder {
    pub fn build(entry: &ConfigEntry, built_at: DateTime<Utc>) -> Result<ArtifactRecord, PublishError> {
        let selectors = entry.context.selectors()?;
        let optional_selectors = optional_selectors(entry.content_type);
        let signature = content_digest(&entry.content);

        let wire = WireConfiguration {
            group: entry.namespace.clone(),
            key: entry.key.clone(),
            version: entry.version.to_string(),
            value: entry.content.clone(),
            signature: signature.clone(),
            selectors: selectors.clone(),
            optional_selectors: optional_selectors.clone(),
            timestamp: built_at.timestamp(),
        };

        Ok(ArtifactRecord {
            identity: IdentityKey {
                selectors: selectors.canonical(),
                optional_selectors: optional_selectors.canonical(),
                group: entry.namespace.clone(),
                key: entry.key.clone(),
            },
            version: entry.version,
            payload: wire.encode()?,
            content_digest: signature,
            built_at,
        })
    }
}

// Reserved for future selector dimensions.
fn optional_selectors(content_type: ContentType) -> Selectors {
    match content_type {
        ContentType::General => Selectors::new(),
    }
}
