use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

/// A value bound to a named placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Uuid(Uuid),
    UuidArray(Vec<Uuid>),
    Json(serde_json::Value),
}

/// Parameterized SQL text. Placeholders are written `:name` and every name
/// used in `sql` has an entry in `parameters`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: Cow<'static, str>,
    pub parameters: BTreeMap<String, SqlValue>,
}

impl SqlFragment {
    /// Vacuous truth, the value of an empty `And`.
    pub const ALWAYS_TRUE: SqlFragment = SqlFragment {
        sql: Cow::Borrowed("1=1"),
        parameters: BTreeMap::new(),
    };

    /// Matches nothing, the value of an empty `Or`.
    pub const ALWAYS_FALSE: SqlFragment = SqlFragment {
        sql: Cow::Borrowed("1=0"),
        parameters: BTreeMap::new(),
    };

    pub fn new(sql: impl Into<Cow<'static, str>>) -> Self {
        Self {
            sql: sql.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn and(self, other: SqlFragment) -> SqlFragment {
        self.combine("AND", other)
    }

    pub fn or(self, other: SqlFragment) -> SqlFragment {
        self.combine("OR", other)
    }

    pub fn wrap(self, prefix: &str, suffix: &str) -> SqlFragment {
        SqlFragment {
            sql: Cow::Owned(format!("{}{}{}", prefix, self.sql, suffix)),
            parameters: self.parameters,
        }
    }

    pub fn is_always_true(&self) -> bool {
        self.sql == Self::ALWAYS_TRUE.sql
    }

    pub fn is_always_false(&self) -> bool {
        self.sql == Self::ALWAYS_FALSE.sql
    }

    fn combine(mut self, op: &str, other: SqlFragment) -> SqlFragment {
        debug_assert!(
            other
                .parameters
                .keys()
                .all(|k| !self.parameters.contains_key(k)),
            "parameter names must be disjoint"
        );
        self.parameters.extend(other.parameters);
        SqlFragment {
            sql: Cow::Owned(format!("({}) {} ({})", self.sql, op, other.sql)),
            parameters: self.parameters,
        }
    }
}

/// Renders `name` as it appears inside SQL text.
pub fn placeholder(name: &str) -> String {
    format!(":{}", name)
}

/// Hands out `prefix_N` names for parameters and table aliases. One instance
/// lives for exactly one compilation pass.
#[derive(Debug, Default)]
pub struct ParameterNameGenerator {
    counter: usize,
}

impl ParameterNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}_{}", prefix, self.counter)
    }
}
