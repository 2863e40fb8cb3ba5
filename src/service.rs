use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};

use metrics::{counter, histogram};
use uuid::Uuid;

use crate::{
    adapters::{EntityRecord, EntityStore},
    config::QueryConfig,
    error::{Error, ValidationIssue},
    query::{
        EntityQuery, EntityQueryResult, QueryFilter, QueryPagination, QueryProjection,
        RelationshipCondition,
    },
    schema::{EntityTypeSchema, RelationshipDefinition, SchemaProvider},
    sql::{AttributeFilterVisitor, EntityQueryAssembler, ParameterNameGenerator},
    validate::QueryFilterValidator,
};

/// Entry point of the query core: validates an [`EntityQuery`] against the
/// schema, compiles it and runs it through the store.
#[derive(Clone)]
pub struct EntityQueryService {
    schemas: Arc<dyn SchemaProvider>,
    store: Arc<dyn EntityStore>,
    config: QueryConfig,
}

impl EntityQueryService {
    pub fn new(schemas: Arc<dyn SchemaProvider>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            schemas,
            store,
            config: QueryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    #[tracing::instrument(
        skip(self, query, projection),
        fields(entity_type_id = %query.entity_type_id)
    )]
    pub async fn execute(
        &self,
        workspace_id: Uuid,
        query: &EntityQuery,
        pagination: QueryPagination,
        projection: Option<QueryProjection>,
    ) -> Result<EntityQueryResult, Error> {
        let start = Instant::now();

        let schema = self
            .schemas
            .entity_type(workspace_id, query.entity_type_id)
            .await?
            .ok_or(Error::EntityTypeNotFound(query.entity_type_id))?;

        let issues = self.check(workspace_id, &schema, query, &pagination).await?;
        if !issues.is_empty() {
            counter!("ousia.entity_query.rejected").increment(1);
            tracing::warn!(issues = issues.len(), "entity_query.rejected");
            return Err(Error::Validation(issues));
        }

        let mut generator = ParameterNameGenerator::new();
        let assembled = EntityQueryAssembler::new(AttributeFilterVisitor::new(
            self.config.max_filter_depth,
        ))
        .assemble(
            query.entity_type_id,
            workspace_id,
            query.filter.as_ref(),
            &pagination,
            &mut generator,
        )?;
        tracing::debug!(
            sql = %assembled.data.sql,
            params = assembled.data.parameters.len(),
            "entity_query.compiled"
        );

        // Both statements are in flight before either outcome is looked at.
        let (ids, total_count) = tokio::join!(
            self.store.query_entity_ids(&assembled.data),
            self.store.count_entities(&assembled.count),
        );
        let ids = ids?;
        let total_count = total_count?;

        let entities = if ids.is_empty() {
            Vec::new()
        } else {
            let records = self.store.fetch_entities(workspace_id, &ids).await?;
            restore_order(&ids, records)
        };

        histogram!("ousia.entity_query.duration_ms",
            "type" => schema.key.clone()
        )
        .record(start.elapsed().as_millis() as f64);

        Ok(EntityQueryResult {
            entities,
            total_count,
            has_next_page: pagination.has_next_page(total_count),
            projection,
        })
    }

    /// Every reference and limit problem of the request, in one list.
    async fn check(
        &self,
        workspace_id: Uuid,
        schema: &EntityTypeSchema,
        query: &EntityQuery,
        pagination: &QueryPagination,
    ) -> Result<Vec<ValidationIssue>, Error> {
        let mut issues = Vec::new();

        if let Some(filter) = &query.filter {
            for attribute_id in QueryFilterValidator::root_attribute_ids(filter) {
                if !schema.has_attribute(&attribute_id) {
                    issues.push(ValidationIssue::InvalidAttributeReference { attribute_id });
                }
            }

            let max_depth = query
                .max_depth
                .unwrap_or(self.config.default_relationship_depth);
            // one level past the limit, so an over-deep reference is still
            // checked against real definitions
            let lookup_depth = max_depth.saturating_add(1);
            let relationships = self
                .reachable_relationships(workspace_id, schema, filter, lookup_depth)
                .await?;
            issues.extend(QueryFilterValidator::new(&relationships, max_depth).validate(filter));
        }

        issues.extend(pagination.issues_within(self.config.max_page_size));
        Ok(issues)
    }

    /// Relationship definitions a filter may legally reference within
    /// `max_depth` levels: the root type's own, then those of every type
    /// reachable through them, breadth-first. Types named by
    /// `TargetTypeMatches` branches are loaded too, since `IsRelatedTo` can
    /// reach them without a definition.
    async fn reachable_relationships(
        &self,
        workspace_id: Uuid,
        root: &EntityTypeSchema,
        filter: &QueryFilter,
        max_depth: usize,
    ) -> Result<HashMap<Uuid, RelationshipDefinition>, Error> {
        let mut relationships = root.relationships.clone();
        let mut visited = HashSet::from([root.id]);

        let mut frontier = target_types(root.relationships.values());
        collect_branch_types(filter, &mut frontier);

        for _ in 1..max_depth {
            let mut next = Vec::new();
            for type_id in frontier {
                if !visited.insert(type_id) {
                    continue;
                }
                let Some(schema) = self.schemas.entity_type(workspace_id, type_id).await? else {
                    tracing::debug!(%type_id, "entity_query.missing_target_type");
                    continue;
                };
                next.extend(target_types(schema.relationships.values()));
                relationships.extend(schema.relationships);
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Ok(relationships)
    }
}

fn target_types<'a>(definitions: impl Iterator<Item = &'a RelationshipDefinition>) -> Vec<Uuid> {
    definitions
        .flat_map(|d| d.target_entity_type_ids.iter().copied())
        .collect()
}

fn collect_branch_types(filter: &QueryFilter, types: &mut Vec<Uuid>) {
    match filter {
        QueryFilter::Attribute { .. } => {}
        QueryFilter::And { conditions } | QueryFilter::Or { conditions } => {
            for condition in conditions {
                collect_branch_types(condition, types);
            }
        }
        QueryFilter::Relationship { condition, .. } | QueryFilter::IsRelatedTo { condition } => {
            match condition {
                RelationshipCondition::TargetMatches { filter } => {
                    collect_branch_types(filter, types)
                }
                RelationshipCondition::TargetTypeMatches { branches } => {
                    for branch in branches {
                        types.push(branch.entity_type_id);
                        if let Some(filter) = &branch.filter {
                            collect_branch_types(filter, types);
                        }
                    }
                }
                RelationshipCondition::Exists
                | RelationshipCondition::NotExists
                | RelationshipCondition::TargetEquals { .. }
                | RelationshipCondition::CountMatches { .. } => {}
            }
        }
    }
}

/// Batch loads come back unordered; put them back in the order the data query
/// produced. Rows deleted in between are dropped.
fn restore_order(ids: &[Uuid], records: Vec<EntityRecord>) -> Vec<EntityRecord> {
    let mut by_id: HashMap<Uuid, EntityRecord> =
        records.into_iter().map(|record| (record.id, record)).collect();
    let ordered: Vec<EntityRecord> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
    if ordered.len() < ids.len() {
        tracing::debug!(
            expected = ids.len(),
            loaded = ordered.len(),
            "entity_query.rows_vanished"
        );
    }
    ordered
}
