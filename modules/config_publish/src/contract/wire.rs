//! Wire payload delivered opaquely to consumers
//!
//! The payload carries everything a consumer needs (metadata, value and
//! signature) so it never has to re-derive it from the store.

use super::error::PublishError;
use super::selectors::Selectors;
use serde::{Deserialize, Serialize};

/// Encoded body of a published artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConfiguration {
    pub group: String,
    pub key: String,
    /// Rendered version tag
    pub version: String,
    pub value: Vec<u8>,
    /// `sha256:<hex>` of `value`
    pub signature: String,
    pub selectors: Selectors,
    pub optional_selectors: Selectors,
    /// Unix seconds at build time
    pub timestamp: i64,
}

impl WireConfiguration {
    pub fn encode(&self) -> Result<Vec<u8>, PublishError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            PublishError::Encoding {
                message: e.to_string(),
            }
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PublishError> {
        let (wire, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| PublishError::Encoding {
                message: e.to_string(),
            })?;
        Ok(wire)
    }
}
