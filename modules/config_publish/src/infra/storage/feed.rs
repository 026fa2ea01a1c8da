//! Read side of the artifact table used by store-polling consumers

use super::entity::artifact;
use crate::contract::ConfigArtifact;
use anyhow::Result;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;

/// Fetches live artifacts for a selector pair and a set of watched keys
#[derive(Clone)]
pub struct ArtifactFeed {
    db: Arc<DatabaseConnection>,
}

impl ArtifactFeed {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Live artifacts for `(group, key)` pairs under the given canonical
    /// selector strings, ordered by sequence. Keys without an artifact are
    /// simply absent from the result.
    pub async fn fetch(
        &self,
        selectors: &str,
        optional_selectors: &str,
        keys: &[(String, String)],
    ) -> Result<Vec<ConfigArtifact>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let watched = keys.iter().fold(Condition::any(), |cond, (group, key)| {
            cond.add(
                Condition::all()
                    .add(artifact::Column::CfgGroup.eq(group.as_str()))
                    .add(artifact::Column::CfgKey.eq(key.as_str())),
            )
        });

        artifact::Entity::find()
            .filter(artifact::Column::Selectors.eq(selectors))
            .filter(artifact::Column::OptionalSelectors.eq(optional_selectors))
            .filter(watched)
            .order_by_asc(artifact::Column::Sequence)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(ConfigArtifact::try_from)
            .collect()
    }
}
