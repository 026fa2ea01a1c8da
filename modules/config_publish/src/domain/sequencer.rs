//! Store-wide version sequencing

use super::repository::ConfigureRepository;
use crate::contract::error::store_error;
use crate::contract::{PublishError, VersionTag};
use sea_orm::DatabaseTransaction;
use std::sync::Arc;

/// Issues strictly increasing version sequences from the store counter
#[derive(Clone)]
pub struct VersionSequencer {
    repo: Arc<dyn ConfigureRepository>,
}

impl VersionSequencer {
    pub fn new(repo: Arc<dyn ConfigureRepository>) -> Self {
        Self { repo }
    }

    /// Next raw sequence
    pub async fn next(&self, txn: &DatabaseTransaction) -> Result<u64, PublishError> {
        let raw = self.repo.next_version_seq(txn).await.map_err(store_error)?;
        u64::try_from(raw)
            .ok()
            .filter(|seq| *seq > 0)
            .ok_or_else(|| PublishError::Store(format!("version counter returned {raw}")))
    }

    /// Next sequence rendered as a version tag
    pub async fn next_tag(&self, txn: &DatabaseTransaction) -> Result<VersionTag, PublishError> {
        Ok(VersionTag::format(self.next(txn).await?))
    }
}
