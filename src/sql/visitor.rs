use crate::{
    error::Error,
    query::{FilterValue, QueryFilter},
    sql::{
        AttributeSqlGenerator, ParameterNameGenerator, ROOT_ALIAS, RelationshipSqlGenerator,
        SqlFragment,
    },
};

pub const DEFAULT_MAX_FILTER_DEPTH: usize = 10;

/// Walks a filter tree and lowers it into one WHERE fragment.
///
/// Depth counts And/Or levels only. Relationship nesting is bounded separately
/// by [`crate::validate::QueryFilterValidator`].
#[derive(Debug, Clone, Copy)]
pub struct AttributeFilterVisitor {
    max_depth: usize,
}

impl Default for AttributeFilterVisitor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILTER_DEPTH)
    }
}

impl AttributeFilterVisitor {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn visit(
        &self,
        filter: &QueryFilter,
        generator: &mut ParameterNameGenerator,
    ) -> Result<SqlFragment, Error> {
        self.visit_at(filter, generator, ROOT_ALIAS, 0)
    }

    fn visit_at(
        &self,
        filter: &QueryFilter,
        generator: &mut ParameterNameGenerator,
        alias: &str,
        depth: usize,
    ) -> Result<SqlFragment, Error> {
        if depth > self.max_depth {
            return Err(Error::FilterDepthExceeded {
                depth,
                max_depth: self.max_depth,
            });
        }

        // Subqueries re-enter the walk against their own target alias.
        let nested = |f: &QueryFilter, g: &mut ParameterNameGenerator, a: &str| {
            self.visit_at(f, g, a, depth)
        };

        match filter {
            QueryFilter::Attribute {
                attribute_id,
                operator,
                value,
            } => {
                let literal = match value {
                    FilterValue::Literal(literal) => literal,
                    FilterValue::Template(expr) => {
                        return Err(Error::UnresolvedTemplate(expr.clone()));
                    }
                };
                AttributeSqlGenerator::generate(*attribute_id, *operator, literal, generator, alias)
            }
            QueryFilter::Relationship {
                relationship_id,
                condition,
            } => RelationshipSqlGenerator::generate(
                *relationship_id,
                condition,
                generator,
                alias,
                Some(&nested),
            ),
            QueryFilter::IsRelatedTo { condition } => {
                RelationshipSqlGenerator::generate_is_related_to(
                    condition,
                    generator,
                    alias,
                    Some(&nested),
                )
            }
            QueryFilter::And { conditions } => self.reduce(
                conditions,
                generator,
                alias,
                depth,
                SqlFragment::and,
                SqlFragment::ALWAYS_TRUE,
            ),
            QueryFilter::Or { conditions } => self.reduce(
                conditions,
                generator,
                alias,
                depth,
                SqlFragment::or,
                SqlFragment::ALWAYS_FALSE,
            ),
        }
    }

    fn reduce(
        &self,
        conditions: &[QueryFilter],
        generator: &mut ParameterNameGenerator,
        alias: &str,
        depth: usize,
        combine: fn(SqlFragment, SqlFragment) -> SqlFragment,
        empty: SqlFragment,
    ) -> Result<SqlFragment, Error> {
        let mut combined: Option<SqlFragment> = None;
        for condition in conditions {
            let fragment = self.visit_at(condition, generator, alias, depth + 1)?;
            combined = Some(match combined {
                Some(acc) => combine(acc, fragment),
                None => fragment,
            });
        }
        Ok(combined.unwrap_or(empty))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::query::{FilterOperator, RelationshipCondition};

    #[test]
    fn test_empty_groups_use_sentinels() {
        let visitor = AttributeFilterVisitor::default();
        let mut generator = ParameterNameGenerator::new();

        let f = visitor.visit(&QueryFilter::and(vec![]), &mut generator).unwrap();
        assert_eq!(f, SqlFragment::ALWAYS_TRUE);

        let f = visitor.visit(&QueryFilter::or(vec![]), &mut generator).unwrap();
        assert_eq!(f, SqlFragment::ALWAYS_FALSE);
    }

    #[test]
    fn test_and_or_combine_in_order() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let filter = QueryFilter::and(vec![
            QueryFilter::attribute(a, FilterOperator::IsNull, ()),
            QueryFilter::or(vec![
                QueryFilter::attribute(b, FilterOperator::IsNull, ()),
                QueryFilter::attribute(c, FilterOperator::IsNotNull, ()),
            ]),
        ]);
        let mut generator = ParameterNameGenerator::new();
        let f = AttributeFilterVisitor::default()
            .visit(&filter, &mut generator)
            .unwrap();
        assert_eq!(
            f.sql,
            "((e.payload -> :attr_1 ->> 'value') IS NULL) AND \
             (((e.payload -> :attr_2 ->> 'value') IS NULL) OR \
             ((e.payload -> :attr_3 ->> 'value') IS NOT NULL))"
        );
        assert_eq!(f.parameters.len(), 3);
    }

    #[test]
    fn test_template_values_are_rejected() {
        let filter = QueryFilter::Attribute {
            attribute_id: Uuid::now_v7(),
            operator: FilterOperator::Equals,
            value: FilterValue::Template("{{ current_user.id }}".to_string()),
        };
        let mut generator = ParameterNameGenerator::new();
        let err = AttributeFilterVisitor::default()
            .visit(&filter, &mut generator)
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedTemplate(expr) if expr == "{{ current_user.id }}"));
    }

    #[test]
    fn test_nesting_limit_reports_depths() {
        let leaf = QueryFilter::attribute(Uuid::now_v7(), FilterOperator::IsNull, ());
        let filter = QueryFilter::and(vec![QueryFilter::or(vec![QueryFilter::and(vec![leaf])])]);
        let mut generator = ParameterNameGenerator::new();

        let err = AttributeFilterVisitor::new(2)
            .visit(&filter, &mut generator)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FilterDepthExceeded {
                depth: 3,
                max_depth: 2
            }
        ));

        let mut generator = ParameterNameGenerator::new();
        assert!(AttributeFilterVisitor::new(3).visit(&filter, &mut generator).is_ok());
    }

    #[test]
    fn test_same_relationship_twice_gets_fresh_aliases() {
        let rel = Uuid::now_v7();
        let name = Uuid::now_v7();
        let inner = QueryFilter::relationship(rel, RelationshipCondition::Exists);
        let filter = QueryFilter::relationship(
            rel,
            QueryFilter::target_matches(QueryFilter::and(vec![
                QueryFilter::attribute(name, FilterOperator::StartsWith, "A"),
                inner,
            ])),
        );
        let mut generator = ParameterNameGenerator::new();
        let f = AttributeFilterVisitor::default()
            .visit(&filter, &mut generator)
            .unwrap();

        assert!(f.sql.contains("JOIN entities t_2 ON t_2.id = r_1.target_entity_id"));
        assert!(f.sql.contains("(t_2.payload -> :attr_4 ->> 'value') ILIKE :like_5"));
        assert!(f.sql.contains("WHERE r_6.source_entity_id = t_2.id"));
        assert_eq!(f.parameters.get("rel_3"), f.parameters.get("rel_7"));
    }
}
