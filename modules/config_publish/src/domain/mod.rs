//! Domain layer - publish path business logic

pub mod coordinator;
pub mod record;
pub mod repository;
pub mod sequencer;
pub mod service;

pub use coordinator::{ApplyOutcome, PublishCoordinator, MAX_APPLY_ATTEMPTS};
pub use record::{content_digest, ArtifactRecord, ConfigRecordBuilder};
pub use repository::{ConfigureRepository, InsertOutcome, PushChangeRepository};
pub use sequencer::VersionSequencer;
pub use service::Service;
