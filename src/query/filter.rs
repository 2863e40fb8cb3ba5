use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comparison applied to one attribute of an entity payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterValue {
    Literal(serde_json::Value),
    /// Placeholder such as `{{ current_user.id }}`; callers substitute it before compiling.
    Template(String),
}

impl FilterValue {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        FilterValue::Literal(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetTypeBranch {
    pub entity_type_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<QueryFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipCondition {
    Exists,
    NotExists,
    #[serde(rename_all = "camelCase")]
    TargetEquals { entity_ids: Vec<String> },
    TargetMatches { filter: Box<QueryFilter> },
    TargetTypeMatches { branches: Vec<TargetTypeBranch> },
    /// Not supported by any generator yet.
    CountMatches { operator: FilterOperator, count: i64 },
}

impl RelationshipCondition {
    pub fn name(&self) -> &'static str {
        match self {
            RelationshipCondition::Exists => "EXISTS",
            RelationshipCondition::NotExists => "NOT_EXISTS",
            RelationshipCondition::TargetEquals { .. } => "TARGET_EQUALS",
            RelationshipCondition::TargetMatches { .. } => "TARGET_MATCHES",
            RelationshipCondition::TargetTypeMatches { .. } => "TARGET_TYPE_MATCHES",
            RelationshipCondition::CountMatches { .. } => "COUNT_MATCHES",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryFilter {
    #[serde(rename_all = "camelCase")]
    Attribute {
        attribute_id: Uuid,
        operator: FilterOperator,
        value: FilterValue,
    },
    #[serde(rename_all = "camelCase")]
    Relationship {
        relationship_id: Uuid,
        condition: RelationshipCondition,
    },
    And { conditions: Vec<QueryFilter> },
    Or { conditions: Vec<QueryFilter> },
    /// Any edge in either direction, regardless of relationship definition.
    IsRelatedTo { condition: RelationshipCondition },
}

impl QueryFilter {
    pub fn attribute(
        attribute_id: Uuid,
        operator: FilterOperator,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        QueryFilter::Attribute {
            attribute_id,
            operator,
            value: FilterValue::literal(value),
        }
    }

    pub fn relationship(relationship_id: Uuid, condition: RelationshipCondition) -> Self {
        QueryFilter::Relationship {
            relationship_id,
            condition,
        }
    }

    pub fn and(conditions: Vec<QueryFilter>) -> Self {
        QueryFilter::And { conditions }
    }

    pub fn or(conditions: Vec<QueryFilter>) -> Self {
        QueryFilter::Or { conditions }
    }

    pub fn target_matches(filter: QueryFilter) -> RelationshipCondition {
        RelationshipCondition::TargetMatches {
            filter: Box::new(filter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_json_shape() {
        let attr = Uuid::now_v7();
        let json = serde_json::json!({
            "type": "AND",
            "conditions": [
                {
                    "type": "ATTRIBUTE",
                    "attributeId": attr,
                    "operator": "EQUALS",
                    "value": { "kind": "LITERAL", "value": "Technology" }
                },
                {
                    "type": "IS_RELATED_TO",
                    "condition": { "kind": "EXISTS" }
                }
            ]
        });

        let filter: QueryFilter = serde_json::from_value(json).unwrap();
        assert_eq!(
            filter,
            QueryFilter::and(vec![
                QueryFilter::attribute(attr, FilterOperator::Equals, "Technology"),
                QueryFilter::IsRelatedTo {
                    condition: RelationshipCondition::Exists
                },
            ])
        );
    }

    #[test]
    fn test_target_equals_keeps_raw_ids() {
        let json = serde_json::json!({ "kind": "TARGET_EQUALS", "entityIds": ["not-a-uuid"] });
        let condition: RelationshipCondition = serde_json::from_value(json).unwrap();
        assert_eq!(
            condition,
            RelationshipCondition::TargetEquals {
                entity_ids: vec!["not-a-uuid".to_string()]
            }
        );
    }
}
