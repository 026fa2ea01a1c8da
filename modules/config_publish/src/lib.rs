//! Config Publish Module
//!
//! Turns edited configuration records into durable, uniquely ordered,
//! tamper-evident wire artifacts inside a transactional store. Each artifact
//! is keyed by its selectors, group and key and carries a monotonic sequence
//! that downstream pollers use to detect change.

// Public exports
pub mod contract;
pub use contract::{
    client::PublishApi, error::PublishError, AddConfigurationRequest, ConfigArtifact, ConfigEntry,
    ContentType, IdentityKey, PublishContext, PublishReceipt, Selectors,
    UpdateConfigurationRequest, VersionTag, WireConfiguration,
};

pub mod config;
pub use config::Config;

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

pub mod module;
pub use module::PublishModule;
