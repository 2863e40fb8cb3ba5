//! # ousia-query
//!
//! Filter-to-SQL query core for a JSONB entity store.
//!
//! Entities are rows of one table whose attributes live in a `payload` JSONB
//! column keyed by attribute id. Relationships are rows of an edge table.
//! A caller describes what it wants as a [`QueryFilter`] tree; this crate
//! checks it against the entity-type schema, lowers it into parameterized SQL
//! and runs it.
//!
//! ## Pipeline
//!
//! 1. [`EntityQueryService::execute`] loads the type schema through a
//!    [`SchemaProvider`].
//! 2. [`QueryFilterValidator`] collects every reference, depth and value
//!    problem in one pass. Nothing runs if any are found.
//! 3. [`EntityQueryAssembler`] lowers the filter with the
//!    [`AttributeFilterVisitor`] and produces a data statement and a count
//!    statement sharing one WHERE clause.
//! 4. Both statements run concurrently on an [`EntityStore`]; the page of
//!    entities is then batch-loaded and returned in SQL order.
//!
//! ```rust,ignore
//! let service = EntityQueryService::new(schemas, Arc::new(PostgresAdapter::from_pool(pool)));
//!
//! let query = EntityQuery::new(company_type).with_filter(QueryFilter::and(vec![
//!     QueryFilter::attribute(industry, FilterOperator::Equals, "Technology"),
//!     QueryFilter::relationship(employees, RelationshipCondition::Exists),
//! ]));
//!
//! let page = service
//!     .execute(workspace_id, &query, QueryPagination::new(20, 0), None)
//!     .await?;
//! ```
//!
//! Every value travels as a bound parameter. SQL text only ever contains
//! placeholders, table aliases and fixed operators.

pub mod adapters;
pub mod config;
pub mod error;
pub mod query;
pub mod schema;
pub mod service;
pub mod sql;
pub mod validate;

pub use adapters::{EntityRecord, EntityStore, RelationshipRecord, memory::MemorySchemaProvider};
#[cfg(feature = "postgres")]
pub use adapters::postgres::PostgresAdapter;
pub use config::QueryConfig;
pub use error::{Error, ValidationIssue};
pub use query::{
    EntityQuery, EntityQueryResult, FilterOperator, FilterValue, QueryFilter, QueryPagination,
    QueryProjection, RelationshipCondition, TargetTypeBranch,
};
pub use schema::{Cardinality, EntityTypeSchema, RelationshipDefinition, SchemaProvider};
pub use service::EntityQueryService;
pub use sql::{
    AssembledQuery, AttributeFilterVisitor, EntityQueryAssembler, ParameterNameGenerator,
    SqlFragment, SqlValue,
};
pub use validate::QueryFilterValidator;
