use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::{
    error::Error,
    schema::{EntityTypeSchema, SchemaProvider},
};

/// Schema registry held in process memory, keyed by workspace and type id.
#[derive(Clone, Default)]
pub struct MemorySchemaProvider {
    types: Arc<RwLock<HashMap<(Uuid, Uuid), EntityTypeSchema>>>,
}

impl MemorySchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, workspace_id: Uuid, schema: EntityTypeSchema) -> Result<(), Error> {
        let mut types = self
            .types
            .write()
            .map_err(|_| Error::Execution {
                message: "schema registry lock poisoned".to_string(),
                source: None,
            })?;
        types.insert((workspace_id, schema.id), schema);
        Ok(())
    }
}

#[async_trait]
impl SchemaProvider for MemorySchemaProvider {
    async fn entity_type(
        &self,
        workspace_id: Uuid,
        entity_type_id: Uuid,
    ) -> Result<Option<EntityTypeSchema>, Error> {
        let types = self
            .types
            .read()
            .map_err(|_| Error::Execution {
                message: "schema registry lock poisoned".to_string(),
                source: None,
            })?;
        Ok(types.get(&(workspace_id, entity_type_id)).cloned())
    }
}
