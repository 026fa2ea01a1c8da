//! Contract layer - public API for inter-module communication
//!
//! This layer contains transport-agnostic models, the wire payload consumers
//! decode, and the native client trait.

pub mod client;
pub mod error;
pub mod model;
pub mod selectors;
pub mod version;
pub mod wire;

pub use client::PublishApi;
pub use error::PublishError;
pub use model::{
    AddConfigurationRequest, ConfigArtifact, ConfigEntry, ContentType, IdentityKey,
    PublishContext, PublishReceipt, UpdateConfigurationRequest,
};
pub use selectors::Selectors;
pub use version::VersionTag;
pub use wire::WireConfiguration;
