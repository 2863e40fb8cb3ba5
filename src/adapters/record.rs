use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// One row of the `entities` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub type_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(workspace_id: Uuid, type_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            workspace_id,
            type_id,
            payload: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets `payload[attribute_id] = {"value": value}`.
    pub fn with_attribute(mut self, attribute_id: Uuid, value: impl Into<serde_json::Value>) -> Self {
        let mut slot = serde_json::Map::with_capacity(1);
        slot.insert("value".to_string(), value.into());
        if let serde_json::Value::Object(map) = &mut self.payload {
            map.insert(attribute_id.to_string(), serde_json::Value::Object(slot));
        }
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    /// Reads the stored value of one attribute, `None` when the key is missing.
    pub fn attribute(&self, attribute_id: Uuid) -> Option<&serde_json::Value> {
        self.payload
            .get(attribute_id.to_string())
            .and_then(|slot| slot.get("value"))
    }

    pub fn attribute_as<T: serde::de::DeserializeOwned>(
        &self,
        attribute_id: Uuid,
    ) -> Result<Option<T>, Error> {
        match self.attribute(attribute_id) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| Error::Deserialize(e.to_string())),
            None => Ok(None),
        }
    }
}

/// A directed edge of the `entity_relationships` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub source_entity_id: Uuid,
    pub relationship_field_id: Uuid,
    pub target_entity_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl RelationshipRecord {
    pub fn new(
        workspace_id: Uuid,
        source_entity_id: Uuid,
        relationship_field_id: Uuid,
        target_entity_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            workspace_id,
            source_entity_id,
            relationship_field_id,
            target_entity_id,
            created_at: Utc::now(),
        }
    }
}
