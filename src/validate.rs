use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::ValidationIssue,
    query::{FilterValue, QueryFilter, RelationshipCondition},
    schema::RelationshipDefinition,
    sql::{AttributeSqlGenerator, relationship::parse_entity_ids},
};

/// Eager check of a filter tree: relationship references and depth, entity
/// ids, literal shapes and unresolved templates. Collects every issue instead
/// of stopping at the first one, and never generates SQL.
pub struct QueryFilterValidator<'a> {
    relationships: &'a HashMap<Uuid, RelationshipDefinition>,
    max_depth: usize,
}

impl<'a> QueryFilterValidator<'a> {
    pub fn new(relationships: &'a HashMap<Uuid, RelationshipDefinition>, max_depth: usize) -> Self {
        Self {
            relationships,
            max_depth,
        }
    }

    pub fn validate(&self, filter: &QueryFilter) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.walk(filter, 0, &mut issues);
        issues
    }

    fn walk(&self, filter: &QueryFilter, depth: usize, issues: &mut Vec<ValidationIssue>) {
        match filter {
            QueryFilter::Attribute {
                attribute_id,
                operator,
                value,
            } => match value {
                FilterValue::Literal(literal) => {
                    if let Err(issue) =
                        AttributeSqlGenerator::check_value(*attribute_id, *operator, literal)
                    {
                        issues.push(issue);
                    }
                }
                FilterValue::Template(expression) => {
                    issues.push(ValidationIssue::UnresolvedTemplate {
                        attribute_id: *attribute_id,
                        expression: expression.clone(),
                    });
                }
            },
            QueryFilter::And { conditions } | QueryFilter::Or { conditions } => {
                for condition in conditions {
                    self.walk(condition, depth, issues);
                }
            }
            QueryFilter::Relationship {
                relationship_id,
                condition,
            } => {
                let entering = depth + 1;
                let within = self.within_depth(entering, issues);
                if !self.relationships.contains_key(relationship_id) {
                    issues.push(ValidationIssue::InvalidRelationshipReference {
                        relationship_id: *relationship_id,
                    });
                }
                if within {
                    self.walk_condition(condition, entering, issues);
                }
            }
            QueryFilter::IsRelatedTo { condition } => {
                let entering = depth + 1;
                if self.within_depth(entering, issues) {
                    self.walk_condition(condition, entering, issues);
                }
            }
        }
    }

    fn walk_condition(
        &self,
        condition: &RelationshipCondition,
        depth: usize,
        issues: &mut Vec<ValidationIssue>,
    ) {
        match condition {
            RelationshipCondition::Exists | RelationshipCondition::NotExists => {}
            RelationshipCondition::TargetEquals { entity_ids } => {
                if let Err(err) = parse_entity_ids(entity_ids) {
                    issues.extend_from_slice(err.issues());
                }
            }
            RelationshipCondition::TargetMatches { filter } => self.walk(filter, depth, issues),
            RelationshipCondition::TargetTypeMatches { branches } => {
                for branch in branches {
                    if let Some(filter) = &branch.filter {
                        self.walk(filter, depth, issues);
                    }
                }
            }
            RelationshipCondition::CountMatches { .. } => {
                issues.push(ValidationIssue::UnsupportedCondition(condition.name()));
            }
        }
    }

    /// Levels below an exceeded one are not walked, so their depth is not
    /// reported again.
    fn within_depth(&self, depth: usize, issues: &mut Vec<ValidationIssue>) -> bool {
        if depth > self.max_depth {
            issues.push(ValidationIssue::RelationshipDepthExceeded {
                depth,
                max_depth: self.max_depth,
            });
            return false;
        }
        true
    }

    /// Attribute ids referenced at the root level, i.e. not under a relationship.
    /// Those are the ones checkable against the queried type.
    pub fn root_attribute_ids(filter: &QueryFilter) -> Vec<Uuid> {
        let mut ids = Vec::new();
        collect_root_attributes(filter, &mut ids);
        ids
    }
}

fn collect_root_attributes(filter: &QueryFilter, ids: &mut Vec<Uuid>) {
    match filter {
        QueryFilter::Attribute { attribute_id, .. } => {
            if !ids.contains(attribute_id) {
                ids.push(*attribute_id);
            }
        }
        QueryFilter::And { conditions } | QueryFilter::Or { conditions } => {
            for condition in conditions {
                collect_root_attributes(condition, ids);
            }
        }
        QueryFilter::Relationship { .. } | QueryFilter::IsRelatedTo { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        query::{FilterOperator, TargetTypeBranch},
        schema::{Cardinality, EntityTypeSchema},
    };

    fn relationships(ids: &[Uuid]) -> HashMap<Uuid, RelationshipDefinition> {
        let mut schema = EntityTypeSchema::new(Uuid::now_v7(), "company");
        for id in ids {
            schema = schema.with_relationship(
                *id,
                "rel",
                vec![Uuid::now_v7()],
                Cardinality::ManyToOne,
            );
        }
        schema.relationships
    }

    fn chain(outer: Uuid, inner: Uuid) -> QueryFilter {
        QueryFilter::relationship(
            outer,
            QueryFilter::target_matches(QueryFilter::relationship(
                inner,
                RelationshipCondition::Exists,
            )),
        )
    }

    #[test]
    fn test_relationship_chain_depth() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let known = relationships(&[a, b]);
        let filter = chain(a, b);

        let issues = QueryFilterValidator::new(&known, 1).validate(&filter);
        assert_eq!(
            issues,
            vec![ValidationIssue::RelationshipDepthExceeded {
                depth: 2,
                max_depth: 1
            }]
        );

        assert!(QueryFilterValidator::new(&known, 2).validate(&filter).is_empty());
    }

    #[test]
    fn test_boolean_groups_do_not_add_depth() {
        let a = Uuid::now_v7();
        let known = relationships(&[a]);
        let filter = QueryFilter::and(vec![QueryFilter::or(vec![QueryFilter::relationship(
            a,
            RelationshipCondition::NotExists,
        )])]);
        assert!(QueryFilterValidator::new(&known, 1).validate(&filter).is_empty());
    }

    #[test]
    fn test_collects_every_issue() {
        let known = relationships(&[]);
        let (missing, other) = (Uuid::now_v7(), Uuid::now_v7());
        let filter = QueryFilter::and(vec![
            QueryFilter::relationship(
                missing,
                RelationshipCondition::TargetEquals {
                    entity_ids: vec!["nope".to_string()],
                },
            ),
            QueryFilter::relationship(
                other,
                RelationshipCondition::CountMatches {
                    operator: FilterOperator::GreaterThan,
                    count: 2,
                },
            ),
        ]);

        let issues = QueryFilterValidator::new(&known, 3).validate(&filter);
        assert_eq!(
            issues,
            vec![
                ValidationIssue::InvalidRelationshipReference {
                    relationship_id: missing
                },
                ValidationIssue::InvalidEntityId("nope".to_string()),
                ValidationIssue::InvalidRelationshipReference {
                    relationship_id: other
                },
                ValidationIssue::UnsupportedCondition("COUNT_MATCHES"),
            ]
        );
    }

    #[test]
    fn test_unknown_relationship_walk_continues() {
        let (missing, nested_missing) = (Uuid::now_v7(), Uuid::now_v7());
        let known = relationships(&[]);
        let issues = QueryFilterValidator::new(&known, 3).validate(&chain(missing, nested_missing));
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_is_related_to_counts_a_level() {
        let known = relationships(&[]);
        let filter = QueryFilter::IsRelatedTo {
            condition: RelationshipCondition::TargetTypeMatches {
                branches: vec![TargetTypeBranch {
                    entity_type_id: Uuid::now_v7(),
                    filter: Some(QueryFilter::IsRelatedTo {
                        condition: RelationshipCondition::Exists,
                    }),
                }],
            },
        };
        assert!(QueryFilterValidator::new(&known, 2).validate(&filter).is_empty());
        assert_eq!(
            QueryFilterValidator::new(&known, 1).validate(&filter),
            vec![ValidationIssue::RelationshipDepthExceeded {
                depth: 2,
                max_depth: 1
            }]
        );
    }

    #[test]
    fn test_unknown_relationship_past_depth_limit() {
        let (known_id, missing) = (Uuid::now_v7(), Uuid::now_v7());
        let known = relationships(&[known_id]);
        let issues = QueryFilterValidator::new(&known, 1).validate(&chain(known_id, missing));
        assert_eq!(
            issues,
            vec![
                ValidationIssue::RelationshipDepthExceeded {
                    depth: 2,
                    max_depth: 1
                },
                ValidationIssue::InvalidRelationshipReference {
                    relationship_id: missing
                },
            ]
        );
    }

    #[test]
    fn test_value_issues_bundled_with_references() {
        let (a, b, missing) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let known = relationships(&[]);

        let both_values = QueryFilter::and(vec![
            QueryFilter::attribute(a, FilterOperator::GreaterThan, "soon"),
            QueryFilter::attribute(b, FilterOperator::LessThan, "later"),
        ]);
        let issues = QueryFilterValidator::new(&known, 3).validate(&both_values);
        assert_eq!(issues.len(), 2);
        assert!(matches!(
            &issues[..],
            [
                ValidationIssue::InvalidFilterValue { attribute_id: first, .. },
                ValidationIssue::InvalidFilterValue { attribute_id: second, .. },
            ] if *first == a && *second == b
        ));

        let mixed = QueryFilter::and(vec![
            QueryFilter::attribute(a, FilterOperator::GreaterThan, "soon"),
            QueryFilter::relationship(missing, RelationshipCondition::Exists),
            QueryFilter::Attribute {
                attribute_id: b,
                operator: FilterOperator::Equals,
                value: FilterValue::Template("{{ user.team }}".to_string()),
            },
        ]);
        let issues = QueryFilterValidator::new(&known, 3).validate(&mixed);
        assert_eq!(issues.len(), 3);
        assert!(matches!(issues[0], ValidationIssue::InvalidFilterValue { .. }));
        assert_eq!(
            issues[1],
            ValidationIssue::InvalidRelationshipReference {
                relationship_id: missing
            }
        );
        assert_eq!(
            issues[2],
            ValidationIssue::UnresolvedTemplate {
                attribute_id: b,
                expression: "{{ user.team }}".to_string()
            }
        );
    }

    #[test]
    fn test_nested_attribute_values_are_checked() {
        let rel = Uuid::now_v7();
        let known = relationships(&[rel]);
        let filter = QueryFilter::relationship(
            rel,
            QueryFilter::target_matches(QueryFilter::attribute(
                Uuid::now_v7(),
                FilterOperator::In,
                "not-a-list",
            )),
        );
        let issues = QueryFilterValidator::new(&known, 3).validate(&filter);
        assert!(matches!(
            &issues[..],
            [ValidationIssue::InvalidFilterValue { .. }]
        ));
    }

    #[test]
    fn test_root_attribute_ids_skip_relationship_subtrees() {
        let (root, nested, rel) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let filter = QueryFilter::or(vec![
            QueryFilter::attribute(root, FilterOperator::IsNull, ()),
            QueryFilter::relationship(
                rel,
                QueryFilter::target_matches(QueryFilter::attribute(
                    nested,
                    FilterOperator::IsNull,
                    (),
                )),
            ),
            QueryFilter::attribute(root, FilterOperator::IsNotNull, ()),
        ]);
        assert_eq!(QueryFilterValidator::root_attribute_ids(&filter), vec![root]);
    }
}
