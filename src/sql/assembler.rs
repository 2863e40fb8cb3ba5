use uuid::Uuid;

use crate::{
    error::Error,
    query::{QueryFilter, QueryPagination},
    sql::{
        AttributeFilterVisitor, ENTITY_TABLE, ParameterNameGenerator, ROOT_ALIAS, SqlFragment,
        SqlValue, placeholder,
    },
};

/// Data and count statements over the same WHERE clause and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledQuery {
    /// Selects `id` only, ordered and paginated.
    pub data: SqlFragment,
    pub count: SqlFragment,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntityQueryAssembler {
    visitor: AttributeFilterVisitor,
}

impl EntityQueryAssembler {
    pub fn new(visitor: AttributeFilterVisitor) -> Self {
        Self { visitor }
    }

    pub fn assemble(
        &self,
        entity_type_id: Uuid,
        workspace_id: Uuid,
        filter: Option<&QueryFilter>,
        pagination: &QueryPagination,
        generator: &mut ParameterNameGenerator,
    ) -> Result<AssembledQuery, Error> {
        let issues = pagination.issues();
        if !issues.is_empty() {
            return Err(Error::Validation(issues));
        }

        let ws = generator.next("ws");
        let type_id = generator.next("type");
        // `deleted = false` stays a literal so the partial index on live rows applies.
        let mut predicate = SqlFragment::new(format!(
            "{a}.workspace_id = {ws} AND {a}.type_id = {ty} AND {a}.deleted = false",
            a = ROOT_ALIAS,
            ws = placeholder(&ws),
            ty = placeholder(&type_id),
        ))
        .with_param(ws, SqlValue::Uuid(workspace_id))
        .with_param(type_id, SqlValue::Uuid(entity_type_id));

        if let Some(filter) = filter {
            predicate = predicate.and(self.visitor.visit(filter, generator)?);
        }

        let limit = generator.next("limit");
        let offset = generator.next("offset");

        // id ASC breaks created_at ties so pages never overlap.
        let data = SqlFragment {
            sql: format!(
                "SELECT {a}.id FROM {table} {a} WHERE {pred} ORDER BY {a}.created_at DESC, {a}.id ASC LIMIT {limit} OFFSET {offset}",
                a = ROOT_ALIAS,
                table = ENTITY_TABLE,
                pred = predicate.sql,
                limit = placeholder(&limit),
                offset = placeholder(&offset),
            )
            .into(),
            parameters: predicate.parameters.clone(),
        }
        .with_param(limit, SqlValue::Int(pagination.limit))
        .with_param(offset, SqlValue::Int(pagination.offset));

        let count = SqlFragment {
            sql: format!(
                "SELECT COUNT(*) FROM {table} {a} WHERE {pred}",
                a = ROOT_ALIAS,
                table = ENTITY_TABLE,
                pred = predicate.sql,
            )
            .into(),
            parameters: predicate.parameters,
        };

        Ok(AssembledQuery { data, count })
    }
}
