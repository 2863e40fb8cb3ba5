use std::collections::HashMap;

use super::PostgresAdapter;
use sqlx::{
    Postgres, Row,
    postgres::{PgArguments, PgRow},
    query::QueryScalar,
};
use uuid::Uuid;

use crate::{
    adapters::EntityRecord,
    error::Error,
    sql::{SqlFragment, SqlValue},
};

/// A fragment rewritten for the wire: `$n` placeholders and the values in
/// bind order. A name used twice shares one position.
#[derive(Debug)]
pub(super) struct PositionalSql<'f> {
    pub sql: String,
    pub values: Vec<&'f SqlValue>,
}

/// Rewrites `:name` placeholders to `$n`. Quoted literals, quoted identifiers
/// and `::` casts pass through untouched.
pub(super) fn to_positional(fragment: &SqlFragment) -> Result<PositionalSql<'_>, Error> {
    let src: &str = &fragment.sql;
    let bytes = src.as_bytes();
    let mut sql = String::with_capacity(src.len());
    let mut values: Vec<&SqlValue> = Vec::with_capacity(fragment.parameters.len());
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(fragment.parameters.len());

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                // '' inside a literal closes and reopens, which copies the same bytes
                let end = src[i + 1..]
                    .find(quote as char)
                    .map(|off| i + 1 + off + 1)
                    .unwrap_or(bytes.len());
                sql.push_str(&src[i..end]);
                i = end;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                sql.push_str("::");
                i += 2;
            }
            b':' if bytes
                .get(i + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') =>
            {
                let start = i + 1;
                let end = src[start..]
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .map(|off| start + off)
                    .unwrap_or(bytes.len());
                let name = &src[start..end];
                let position = match positions.get(name) {
                    Some(position) => *position,
                    None => {
                        let value = fragment.parameters.get(name).ok_or_else(|| {
                            Error::Execution {
                                message: format!("no value bound for placeholder :{}", name),
                                source: None,
                            }
                        })?;
                        values.push(value);
                        positions.insert(name, values.len());
                        values.len()
                    }
                };
                sql.push('$');
                sql.push_str(&position.to_string());
                i = end;
            }
            _ => {
                let next = src[i..]
                    .find(['\'', '"', ':'])
                    .map(|off| if off == 0 { i + 1 } else { i + off })
                    .unwrap_or(bytes.len());
                sql.push_str(&src[i..next]);
                i = next;
            }
        }
    }

    Ok(PositionalSql { sql, values })
}

pub(super) fn query_scalar_bind_values<'q, O>(
    mut query: QueryScalar<'q, Postgres, O, PgArguments>,
    values: &[&'q SqlValue],
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    for value in values.iter().copied() {
        query = match value {
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Uuid(id) => query.bind(*id),
            SqlValue::UuidArray(ids) => query.bind(ids.clone()),
            SqlValue::Json(json) => query.bind(json.clone()),
        };
    }
    query
}

impl PostgresAdapter {
    pub(super) fn map_row_to_entity_record(row: PgRow) -> Result<EntityRecord, Error> {
        let de = |e: sqlx::Error| Error::Deserialize(e.to_string());
        Ok(EntityRecord {
            id: row.try_get::<Uuid, _>("id").map_err(de)?,
            workspace_id: row.try_get::<Uuid, _>("workspace_id").map_err(de)?,
            type_id: row.try_get::<Uuid, _>("type_id").map_err(de)?,
            payload: row
                .try_get::<serde_json::Value, _>("payload")
                .map_err(de)?,
            created_at: row.try_get("created_at").map_err(de)?,
            updated_at: row.try_get("updated_at").map_err(de)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_placeholders_become_positional() {
        let fragment = SqlFragment::new(
            "(e.payload -> :attr_1 ->> 'value') ~ '^-?[0-9]+(\\.[0-9]+)?$' \
             AND (e.payload -> :attr_1 ->> 'value')::numeric > :num_2::numeric",
        )
        .with_param("attr_1", SqlValue::Text("a".into()))
        .with_param("num_2", SqlValue::Text("3.5".into()));

        let positional = to_positional(&fragment).unwrap();
        assert_eq!(
            positional.sql,
            "(e.payload -> $1 ->> 'value') ~ '^-?[0-9]+(\\.[0-9]+)?$' \
             AND (e.payload -> $1 ->> 'value')::numeric > $2::numeric"
        );
        assert_eq!(
            positional.values,
            vec![&SqlValue::Text("a".into()), &SqlValue::Text("3.5".into())]
        );
    }

    #[test]
    fn test_colons_inside_literals_are_kept() {
        let fragment = SqlFragment::new("x = 'a:b' AND \"weird:col\" = :p_1")
            .with_param("p_1", SqlValue::Int(1));
        let positional = to_positional(&fragment).unwrap();
        assert_eq!(positional.sql, "x = 'a:b' AND \"weird:col\" = $1");
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let fragment = SqlFragment::new("e.id = :ghost_1");
        assert!(matches!(
            to_positional(&fragment),
            Err(Error::Execution { message, .. }) if message.contains(":ghost_1")
        ));
    }
}
