mod helper;
mod store_impl;

use std::time::Duration;

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::Error;

/// PostgreSQL store for JSONB entities and their relationship edges
///
/// Schema:
/// ```sql
/// CREATE TABLE public.entities (
///     id uuid PRIMARY KEY,
///     workspace_id uuid NOT NULL,
///     type_id uuid NOT NULL,
///     payload JSONB NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     deleted BOOLEAN NOT NULL DEFAULT false
/// );
///
/// -- workspace and type are always bound; matches the default sort
/// CREATE INDEX idx_entities_live ON entities(workspace_id, type_id, created_at DESC, id)
///     WHERE deleted = false;
/// -- containment lookups from EQUALS filters
/// CREATE INDEX idx_entities_payload ON entities USING GIN (payload jsonb_path_ops);
///
/// CREATE TABLE public.entity_relationships (
///     id uuid PRIMARY KEY,
///     workspace_id uuid NOT NULL,
///     source_entity_id uuid NOT NULL,
///     relationship_field_id uuid NOT NULL,
///     target_entity_id uuid NOT NULL,
///     deleted BOOLEAN NOT NULL DEFAULT false,
///     created_at TIMESTAMPTZ NOT NULL
/// );
/// ```
#[derive(Clone)]
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Caps every query statement. Applied per transaction, so pooled
    /// connections keep their own setting.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub(crate) async fn begin_read(&self) -> Result<Transaction<'static, Postgres>, Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::execution("failed to open transaction", e))?;

        if let Some(timeout) = self.statement_timeout {
            sqlx::query("SELECT set_config('statement_timeout', $1, true)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::execution("failed to set statement timeout", e))?;
        }

        Ok(tx)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<(), Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::execution("failed to open transaction", e))?;

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS public.entities (
                id uuid PRIMARY KEY,
                workspace_id uuid NOT NULL,
                type_id uuid NOT NULL,
                payload JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                deleted BOOLEAN NOT NULL DEFAULT false
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_entities_live
                ON public.entities(workspace_id, type_id, created_at DESC, id)
                WHERE deleted = false;
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_entities_payload
                ON public.entities USING GIN (payload jsonb_path_ops);
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS public.entity_relationships (
                id uuid PRIMARY KEY,
                workspace_id uuid NOT NULL,
                source_entity_id uuid NOT NULL,
                relationship_field_id uuid NOT NULL,
                target_entity_id uuid NOT NULL,
                deleted BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_entity_relationships_source
                ON public.entity_relationships(source_entity_id, relationship_field_id)
                INCLUDE (target_entity_id)
                WHERE deleted = false;
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_entity_relationships_target
                ON public.entity_relationships(target_entity_id, relationship_field_id)
                INCLUDE (source_entity_id)
                WHERE deleted = false;
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::execution("schema initialization failed", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::execution("schema initialization failed", e))?;

        Ok(())
    }
}
