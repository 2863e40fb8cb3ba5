//! SQL compilation: fragments, per-node generators, the filter visitor and
//! the statement assembler.

pub mod assembler;
pub mod attribute;
pub mod fragment;
pub mod relationship;
pub mod visitor;

pub use assembler::{AssembledQuery, EntityQueryAssembler};
pub use attribute::AttributeSqlGenerator;
pub use fragment::{ParameterNameGenerator, SqlFragment, SqlValue, placeholder};
pub use relationship::{NestedFilterLowering, RelationshipSqlGenerator};
pub use visitor::AttributeFilterVisitor;

pub const ENTITY_TABLE: &str = "entities";
pub const RELATIONSHIP_TABLE: &str = "entity_relationships";

/// Alias of the entity row the root query selects from.
pub const ROOT_ALIAS: &str = "e";
