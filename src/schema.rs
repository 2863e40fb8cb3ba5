use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDefinition {
    pub id: Uuid,
    pub name: String,
    pub source_entity_type_id: Uuid,
    /// More than one entry makes the relationship polymorphic.
    pub target_entity_type_ids: Vec<Uuid>,
    pub cardinality: Cardinality,
}

/// Attribute and relationship definitions of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeSchema {
    pub id: Uuid,
    pub key: String,
    pub attributes: HashSet<Uuid>,
    pub relationships: HashMap<Uuid, RelationshipDefinition>,
}

impl EntityTypeSchema {
    pub fn new(id: Uuid, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            attributes: HashSet::new(),
            relationships: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, attribute_id: Uuid) -> Self {
        self.attributes.insert(attribute_id);
        self
    }

    pub fn with_relationship(
        mut self,
        id: Uuid,
        name: impl Into<String>,
        target_entity_type_ids: Vec<Uuid>,
        cardinality: Cardinality,
    ) -> Self {
        self.relationships.insert(
            id,
            RelationshipDefinition {
                id,
                name: name.into(),
                source_entity_type_id: self.id,
                target_entity_type_ids,
                cardinality,
            },
        );
        self
    }

    pub fn has_attribute(&self, attribute_id: &Uuid) -> bool {
        self.attributes.contains(attribute_id)
    }
}

/// Lookup of entity-type definitions. Implementations are read-only from the
/// point of view of the query core.
#[async_trait]
pub trait SchemaProvider: Send + Sync + 'static {
    async fn entity_type(
        &self,
        workspace_id: Uuid,
        entity_type_id: Uuid,
    ) -> Result<Option<EntityTypeSchema>, Error>;
}
