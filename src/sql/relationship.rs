use uuid::Uuid;

use crate::{
    error::{Error, ValidationIssue},
    query::{QueryFilter, RelationshipCondition, TargetTypeBranch},
    sql::{ENTITY_TABLE, ParameterNameGenerator, RELATIONSHIP_TABLE, SqlFragment, SqlValue, placeholder},
};

/// Callback that lowers a nested filter against a given table alias. The
/// relationship generator receives it instead of depending on the visitor.
pub type NestedFilterLowering<'a> =
    &'a dyn Fn(&QueryFilter, &mut ParameterNameGenerator, &str) -> Result<SqlFragment, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeDirection {
    /// Entity is the edge source.
    Outgoing,
    /// Entity is the edge target.
    Incoming,
}

impl EdgeDirection {
    fn anchor_column(self) -> &'static str {
        match self {
            EdgeDirection::Outgoing => "source_entity_id",
            EdgeDirection::Incoming => "target_entity_id",
        }
    }

    fn counterpart_column(self) -> &'static str {
        match self {
            EdgeDirection::Outgoing => "target_entity_id",
            EdgeDirection::Incoming => "source_entity_id",
        }
    }
}

/// `SELECT 1 FROM entity_relationships r [JOIN entities t] WHERE …` under construction.
struct EdgeSubquery {
    fragment: SqlFragment,
    edge_alias: String,
    target_alias: Option<String>,
}

impl EdgeSubquery {
    fn new(
        direction: EdgeDirection,
        relationship_id: Option<Uuid>,
        join_target: bool,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> Self {
        let edge_alias = generator.next("r");
        let target_alias = join_target.then(|| generator.next("t"));

        let mut sql = format!("SELECT 1 FROM {} {}", RELATIONSHIP_TABLE, edge_alias);
        if let Some(t) = &target_alias {
            sql.push_str(&format!(
                " JOIN {table} {t} ON {t}.id = {r}.{col} AND {t}.deleted = false",
                table = ENTITY_TABLE,
                t = t,
                r = edge_alias,
                col = direction.counterpart_column(),
            ));
        }
        sql.push_str(&format!(
            " WHERE {}.{} = {}.id",
            edge_alias,
            direction.anchor_column(),
            alias
        ));

        let mut fragment = SqlFragment::new(String::new());
        if let Some(relationship_id) = relationship_id {
            let param = generator.next("rel");
            sql.push_str(&format!(
                " AND {}.relationship_field_id = {}",
                edge_alias,
                placeholder(&param)
            ));
            fragment = fragment.with_param(param, SqlValue::Uuid(relationship_id));
        }
        sql.push_str(&format!(" AND {}.deleted = false", edge_alias));
        fragment.sql = sql.into();

        Self {
            fragment,
            edge_alias,
            target_alias,
        }
    }

    fn filter(mut self, predicate: SqlFragment) -> Self {
        self.fragment = SqlFragment {
            sql: format!("{} AND ({})", self.fragment.sql, predicate.sql).into(),
            parameters: {
                let mut params = self.fragment.parameters;
                params.extend(predicate.parameters);
                params
            },
        };
        self
    }

    fn exists(self) -> SqlFragment {
        self.fragment.wrap("EXISTS (", ")")
    }

    fn not_exists(self) -> SqlFragment {
        self.fragment.wrap("NOT EXISTS (", ")")
    }
}

/// Lowers relationship conditions into correlated `EXISTS` subqueries over
/// the edge table. Workspace scoping stays with the root query.
pub struct RelationshipSqlGenerator;

impl RelationshipSqlGenerator {
    pub fn generate(
        relationship_id: Uuid,
        condition: &RelationshipCondition,
        generator: &mut ParameterNameGenerator,
        alias: &str,
        nested: Option<NestedFilterLowering<'_>>,
    ) -> Result<SqlFragment, Error> {
        Self::directed(
            EdgeDirection::Outgoing,
            Some(relationship_id),
            condition,
            generator,
            alias,
            nested,
        )
    }

    /// Either direction, any relationship definition. The condition constrains
    /// the entity on the other end of the edge.
    pub fn generate_is_related_to(
        condition: &RelationshipCondition,
        generator: &mut ParameterNameGenerator,
        alias: &str,
        nested: Option<NestedFilterLowering<'_>>,
    ) -> Result<SqlFragment, Error> {
        let negate = matches!(condition, RelationshipCondition::NotExists);
        let exists = RelationshipCondition::Exists;
        let inner = if negate { &exists } else { condition };

        let outgoing =
            Self::directed(EdgeDirection::Outgoing, None, inner, generator, alias, nested)?;
        let incoming =
            Self::directed(EdgeDirection::Incoming, None, inner, generator, alias, nested)?;
        let either = outgoing.or(incoming);

        Ok(if negate {
            either.wrap("NOT (", ")")
        } else {
            either
        })
    }

    fn directed(
        direction: EdgeDirection,
        relationship_id: Option<Uuid>,
        condition: &RelationshipCondition,
        generator: &mut ParameterNameGenerator,
        alias: &str,
        nested: Option<NestedFilterLowering<'_>>,
    ) -> Result<SqlFragment, Error> {
        match condition {
            RelationshipCondition::Exists => {
                Ok(EdgeSubquery::new(direction, relationship_id, false, generator, alias).exists())
            }
            RelationshipCondition::NotExists => Ok(EdgeSubquery::new(
                direction,
                relationship_id,
                false,
                generator,
                alias,
            )
            .not_exists()),
            RelationshipCondition::TargetEquals { entity_ids } => {
                let ids = parse_entity_ids(entity_ids)?;
                if ids.is_empty() {
                    return Ok(SqlFragment::ALWAYS_FALSE);
                }
                let subquery = EdgeSubquery::new(direction, relationship_id, false, generator, alias);
                let param = generator.next("targets");
                let predicate = SqlFragment::new(format!(
                    "{}.{} = ANY({})",
                    subquery.edge_alias,
                    direction.counterpart_column(),
                    placeholder(&param)
                ))
                .with_param(param, SqlValue::UuidArray(ids));
                Ok(subquery.filter(predicate).exists())
            }
            RelationshipCondition::TargetMatches { filter } => {
                let Some(lower) = nested else {
                    return Err(Error::Unsupported(
                        "TARGET_MATCHES requires a nested filter callback".to_string(),
                    ));
                };
                let subquery = EdgeSubquery::new(direction, relationship_id, true, generator, alias);
                let target = subquery.target_alias.clone().unwrap_or_default();
                let predicate = lower(filter.as_ref(), generator, &target)?;
                Ok(subquery.filter(predicate).exists())
            }
            RelationshipCondition::TargetTypeMatches { branches } => {
                if branches.is_empty() {
                    return Ok(SqlFragment::ALWAYS_FALSE);
                }
                let subquery = EdgeSubquery::new(direction, relationship_id, true, generator, alias);
                let target = subquery.target_alias.clone().unwrap_or_default();
                let mut combined: Option<SqlFragment> = None;
                for branch in branches {
                    let fragment = Self::type_branch(branch, generator, &target, nested)?;
                    combined = Some(match combined {
                        Some(acc) => acc.or(fragment),
                        None => fragment,
                    });
                }
                let predicate = combined.unwrap_or(SqlFragment::ALWAYS_FALSE);
                Ok(subquery.filter(predicate).exists())
            }
            RelationshipCondition::CountMatches { .. } => Err(Error::Unsupported(
                "COUNT_MATCHES relationship conditions are not supported".to_string(),
            )),
        }
    }

    fn type_branch(
        branch: &TargetTypeBranch,
        generator: &mut ParameterNameGenerator,
        target: &str,
        nested: Option<NestedFilterLowering<'_>>,
    ) -> Result<SqlFragment, Error> {
        let param = generator.next("type");
        let type_check = SqlFragment::new(format!("{}.type_id = {}", target, placeholder(&param)))
            .with_param(param, SqlValue::Uuid(branch.entity_type_id));

        match &branch.filter {
            None => Ok(type_check),
            Some(filter) => {
                let Some(lower) = nested else {
                    return Err(Error::Unsupported(
                        "TARGET_TYPE_MATCHES branch filters require a nested filter callback"
                            .to_string(),
                    ));
                };
                Ok(type_check.and(lower(filter, generator, target)?))
            }
        }
    }
}

/// Every id must be a UUID; all bad ids are reported together.
pub(crate) fn parse_entity_ids(raw: &[String]) -> Result<Vec<Uuid>, Error> {
    let mut ids = Vec::with_capacity(raw.len());
    let mut issues = Vec::new();
    for id in raw {
        match Uuid::parse_str(id.trim()) {
            Ok(uuid) => ids.push(uuid),
            Err(_) => issues.push(ValidationIssue::InvalidEntityId(id.clone())),
        }
    }
    if issues.is_empty() {
        Ok(ids)
    } else {
        Err(Error::Validation(issues))
    }
}
