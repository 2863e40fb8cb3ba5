use crate::{
    query::{DEFAULT_RELATIONSHIP_DEPTH, MAX_PAGE_SIZE},
    sql::visitor::DEFAULT_MAX_FILTER_DEPTH,
};

/// Limits applied by [`crate::service::EntityQueryService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// And/Or nesting allowed in one filter tree.
    pub max_filter_depth: usize,
    /// Used when a query does not carry its own relationship depth.
    pub default_relationship_depth: usize,
    /// Upper bound on `limit`. Never above [`MAX_PAGE_SIZE`].
    pub max_page_size: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_filter_depth: DEFAULT_MAX_FILTER_DEPTH,
            default_relationship_depth: DEFAULT_RELATIONSHIP_DEPTH,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl QueryConfig {
    pub fn with_max_filter_depth(mut self, depth: usize) -> Self {
        self.max_filter_depth = depth;
        self
    }

    pub fn with_default_relationship_depth(mut self, depth: usize) -> Self {
        self.default_relationship_depth = depth;
        self
    }

    pub fn with_max_page_size(mut self, size: i64) -> Self {
        self.max_page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }
}
