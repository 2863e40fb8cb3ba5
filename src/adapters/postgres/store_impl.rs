use uuid::Uuid;

use super::{
    PostgresAdapter,
    helper::{query_scalar_bind_values, to_positional},
};
use crate::{
    adapters::{EntityRecord, EntityStore, RelationshipRecord},
    error::Error,
    sql::SqlFragment,
};

#[async_trait::async_trait]
impl EntityStore for PostgresAdapter {
    async fn query_entity_ids(&self, query: &SqlFragment) -> Result<Vec<Uuid>, Error> {
        let positional = to_positional(query)?;
        let mut tx = self.begin_read().await?;

        let ids = query_scalar_bind_values(
            sqlx::query_scalar::<_, Uuid>(&positional.sql),
            &positional.values,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| Error::execution("entity query failed", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::execution("entity query failed", e))?;
        Ok(ids)
    }

    async fn count_entities(&self, query: &SqlFragment) -> Result<u64, Error> {
        let positional = to_positional(query)?;
        let mut tx = self.begin_read().await?;

        let count = query_scalar_bind_values(
            sqlx::query_scalar::<_, i64>(&positional.sql),
            &positional.values,
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::execution("entity count failed", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::execution("entity count failed", e))?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_entities(
        &self,
        workspace_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<EntityRecord>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, workspace_id, type_id, payload, created_at, updated_at
            FROM entities
            WHERE workspace_id = $1 AND id = ANY($2) AND deleted = false
            "#,
        )
        .bind(workspace_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::execution("entity fetch failed", e))?;

        rows.into_iter()
            .map(Self::map_row_to_entity_record)
            .collect()
    }
}

/// Write helpers for fixtures and the API layer. The query core never calls these.
impl PostgresAdapter {
    pub async fn insert_entity(&self, record: &EntityRecord) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO public.entities (id, workspace_id, type_id, payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.workspace_id)
        .bind(record.type_id)
        .bind(&record.payload)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::execution("entity insert failed", e))?;
        Ok(())
    }

    /// Soft-deletes one entity. Its edges stay live: `TargetMatches` and
    /// `TargetTypeMatches` skip a deleted counterpart through their join, while
    /// `Exists`, `NotExists`, `TargetEquals` and `IsRelatedTo` still see the edge.
    /// Callers wanting the edges gone use [`Self::delete_relationships`].
    pub async fn delete_entity(&self, workspace_id: Uuid, id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE public.entities
            SET deleted = true, updated_at = now()
            WHERE workspace_id = $1 AND id = $2 AND deleted = false
            "#,
        )
        .bind(workspace_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::execution("entity delete failed", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_relationship(&self, record: &RelationshipRecord) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO public.entity_relationships
                (id, workspace_id, source_entity_id, relationship_field_id, target_entity_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.workspace_id)
        .bind(record.source_entity_id)
        .bind(record.relationship_field_id)
        .bind(record.target_entity_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::execution("relationship insert failed", e))?;
        Ok(())
    }

    /// Soft-deletes every live edge of `relationship_field_id` leaving
    /// `source_entity_id`. Returns how many edges were removed.
    pub async fn delete_relationships(
        &self,
        workspace_id: Uuid,
        source_entity_id: Uuid,
        relationship_field_id: Uuid,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE public.entity_relationships
            SET deleted = true
            WHERE workspace_id = $1
              AND source_entity_id = $2
              AND relationship_field_id = $3
              AND deleted = false
            "#,
        )
        .bind(workspace_id)
        .bind(source_entity_id)
        .bind(relationship_field_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::execution("relationship delete failed", e))?;
        Ok(result.rows_affected())
    }
}
