#[cfg(feature = "postgres")]
pub mod postgres;

pub mod memory;
pub mod record;

use async_trait::async_trait;
pub use record::*;
use uuid::Uuid;

use crate::{error::Error, sql::SqlFragment};

/// -----------------------------
/// Entity storage contract
/// -----------------------------

#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    /// Runs a compiled data query whose single selected column is the entity id.
    /// Ids come back in the order the statement produced them.
    async fn query_entity_ids(&self, query: &SqlFragment) -> Result<Vec<Uuid>, Error>;

    /// Runs a compiled `SELECT COUNT(*)` statement.
    async fn count_entities(&self, query: &SqlFragment) -> Result<u64, Error>;

    /// Batch fetch of live entities by id. No ordering guarantee.
    async fn fetch_entities(
        &self,
        workspace_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<EntityRecord>, Error>;
}
