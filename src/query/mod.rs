pub mod filter;

pub use filter::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{adapters::EntityRecord, error::ValidationIssue};

pub const MAX_PAGE_SIZE: i64 = 500;
pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const DEFAULT_RELATIONSHIP_DEPTH: usize = 3;

/// What the API layer asks for: one entity type, an optional filter tree and
/// a bound on relationship nesting. Without a bound the service falls back to
/// its configured default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityQuery {
    pub entity_type_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<QueryFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl EntityQuery {
    pub fn new(entity_type_id: Uuid) -> Self {
        Self {
            entity_type_id,
            filter: None,
            max_depth: None,
        }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

/// Offset pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for QueryPagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl QueryPagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.issues_within(MAX_PAGE_SIZE)
    }

    pub fn issues_within(&self, max_page_size: i64) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.limit < 1 || self.limit > max_page_size {
            issues.push(ValidationIssue::InvalidPagination(format!(
                "limit must be between 1 and {}, got {}",
                max_page_size, self.limit
            )));
        }
        if self.offset < 0 {
            issues.push(ValidationIssue::InvalidPagination(format!(
                "offset must be non-negative, got {}",
                self.offset
            )));
        }
        issues
    }

    pub fn has_next_page(&self, total_count: u64) -> bool {
        let end = self.offset.saturating_add(self.limit);
        end >= 0 && (end as u64) < total_count
    }
}

/// Projection hint passed through untouched to the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryProjection {
    #[serde(default)]
    pub attribute_ids: Vec<Uuid>,
    #[serde(default)]
    pub relationship_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityQueryResult {
    pub entities: Vec<EntityRecord>,
    pub total_count: u64,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<QueryProjection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        assert!(QueryPagination::new(1, 0).issues().is_empty());
        assert!(QueryPagination::new(500, 10).issues().is_empty());
        assert_eq!(QueryPagination::new(0, 0).issues().len(), 1);
        assert_eq!(QueryPagination::new(501, 0).issues().len(), 1);
        assert_eq!(QueryPagination::new(0, -1).issues().len(), 2);
    }

    #[test]
    fn test_has_next_page() {
        assert!(QueryPagination::new(3, 0).has_next_page(10));
        assert!(QueryPagination::new(3, 6).has_next_page(10));
        assert!(!QueryPagination::new(3, 9).has_next_page(10));
        assert!(!QueryPagination::new(3, 9).has_next_page(12));
        assert!(QueryPagination::new(3, 9).has_next_page(13));
    }

    #[test]
    fn test_entity_query_minimal_payload() {
        let id = Uuid::now_v7();
        let query: EntityQuery =
            serde_json::from_value(serde_json::json!({ "entityTypeId": id })).unwrap();
        assert_eq!(query.max_depth, None);
        assert!(query.filter.is_none());
    }
}
