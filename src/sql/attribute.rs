use uuid::Uuid;

use crate::{
    error::{Error, ValidationIssue},
    query::FilterOperator,
    sql::{ParameterNameGenerator, SqlFragment, SqlValue, placeholder},
};

/// Optional sign, digits, optional fraction. Guards every `::numeric` cast.
const NUMERIC_PATTERN: &str = r"'^-?[0-9]+(\.[0-9]+)?$'";

/// Lowers a single attribute comparison into SQL over the JSONB `payload`
/// column of the entity bound to `alias`. Attribute values are stored as
/// `payload -> <attribute id> -> 'value'`.
///
/// Equality and membership compare JSONB values through containment, so
/// `100` and `100.0` are the same value for EQUALS, NOT_EQUALS, IN and NOT_IN.
pub struct AttributeSqlGenerator;

impl AttributeSqlGenerator {
    pub fn generate(
        attribute_id: Uuid,
        operator: FilterOperator,
        value: &serde_json::Value,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> Result<SqlFragment, Error> {
        Self::lower(attribute_id, operator, value, generator, alias).map_err(Error::validation)
    }

    /// Shape check of a literal for `operator`, the same one `generate` applies.
    pub fn check_value(
        attribute_id: Uuid,
        operator: FilterOperator,
        value: &serde_json::Value,
    ) -> Result<(), ValidationIssue> {
        use FilterOperator::*;

        match operator {
            Equals | NotEquals | IsNull | IsNotNull => Ok(()),
            GreaterThan | GreaterThanOrEquals | LessThan | LessThanOrEquals => {
                Self::numeric_literal(attribute_id, value).map(drop)
            }
            In | NotIn => Self::list_items(attribute_id, value).map(drop),
            Contains | NotContains | StartsWith | EndsWith => {
                Self::text_literal(attribute_id, value).map(drop)
            }
        }
    }

    fn lower(
        attribute_id: Uuid,
        operator: FilterOperator,
        value: &serde_json::Value,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> Result<SqlFragment, ValidationIssue> {
        use FilterOperator::*;

        match operator {
            Equals if value.is_null() => Ok(Self::null_check(attribute_id, true, generator, alias)),
            Equals => Ok(Self::equals(attribute_id, value, generator, alias)),
            NotEquals if value.is_null() => {
                Ok(Self::null_check(attribute_id, false, generator, alias))
            }
            NotEquals => Ok(Self::not_equals(attribute_id, value, generator, alias)),
            GreaterThan => Self::numeric(attribute_id, ">", value, generator, alias),
            GreaterThanOrEquals => Self::numeric(attribute_id, ">=", value, generator, alias),
            LessThan => Self::numeric(attribute_id, "<", value, generator, alias),
            LessThanOrEquals => Self::numeric(attribute_id, "<=", value, generator, alias),
            In => Self::membership(attribute_id, false, value, generator, alias),
            NotIn => Self::membership(attribute_id, true, value, generator, alias),
            Contains => Self::pattern(attribute_id, "ILIKE", "%", "%", value, generator, alias),
            NotContains => {
                Self::pattern(attribute_id, "NOT ILIKE", "%", "%", value, generator, alias)
            }
            StartsWith => Self::pattern(attribute_id, "ILIKE", "", "%", value, generator, alias),
            EndsWith => Self::pattern(attribute_id, "ILIKE", "%", "", value, generator, alias),
            IsNull => Ok(Self::null_check(attribute_id, true, generator, alias)),
            IsNotNull => Ok(Self::null_check(attribute_id, false, generator, alias)),
        }
    }

    /// Containment keeps the predicate on the GIN index over `payload`.
    fn equals(
        attribute_id: Uuid,
        value: &serde_json::Value,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> SqlFragment {
        let param = generator.next("eq");
        let sql = format!("{}.payload @> {}", alias, placeholder(&param));
        SqlFragment::new(sql).with_param(
            param,
            SqlValue::Json(Self::containment_document(attribute_id, value)),
        )
    }

    /// The key has to exist; a missing attribute is not "different".
    fn not_equals(
        attribute_id: Uuid,
        value: &serde_json::Value,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> SqlFragment {
        let key = generator.next("attr");
        let param = generator.next("ne");
        let sql = format!(
            "{alias}.payload ? {key_ph} AND NOT ({alias}.payload @> {param_ph})",
            alias = alias,
            key_ph = placeholder(&key),
            param_ph = placeholder(&param),
        );
        SqlFragment::new(sql)
            .with_param(key, SqlValue::Text(attribute_id.to_string()))
            .with_param(
                param,
                SqlValue::Json(Self::containment_document(attribute_id, value)),
            )
    }

    /// The literal is bound as its exact decimal text and cast server side.
    fn numeric(
        attribute_id: Uuid,
        op: &str,
        value: &serde_json::Value,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> Result<SqlFragment, ValidationIssue> {
        let number = Self::numeric_literal(attribute_id, value)?;
        let key = generator.next("attr");
        let param = generator.next("num");
        let acc = Self::accessor(alias, &key);
        let sql = format!(
            "CASE WHEN {acc} ~ {pattern} THEN {acc}::numeric {op} {param_ph}::numeric ELSE false END",
            acc = acc,
            pattern = NUMERIC_PATTERN,
            op = op,
            param_ph = placeholder(&param),
        );
        Ok(SqlFragment::new(sql)
            .with_param(key, SqlValue::Text(attribute_id.to_string()))
            .with_param(param, SqlValue::Text(number)))
    }

    /// One containment per item, OR-ed.
    fn membership(
        attribute_id: Uuid,
        negated: bool,
        value: &serde_json::Value,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> Result<SqlFragment, ValidationIssue> {
        let items = Self::list_items(attribute_id, value)?;
        if items.is_empty() {
            return Ok(if negated {
                SqlFragment::ALWAYS_TRUE
            } else {
                SqlFragment::ALWAYS_FALSE
            });
        }

        let key = negated.then(|| generator.next("attr"));
        let mut fragment = SqlFragment::new(String::new());
        let mut alternatives = Vec::with_capacity(items.len());
        for item in items {
            let param = generator.next("in");
            alternatives.push(format!("{}.payload @> {}", alias, placeholder(&param)));
            fragment = fragment.with_param(
                param,
                SqlValue::Json(Self::containment_document(attribute_id, item)),
            );
        }
        let any = alternatives.join(" OR ");

        let sql = match &key {
            Some(key) => format!("{}.payload ? {} AND NOT ({})", alias, placeholder(key), any),
            None => any,
        };
        fragment.sql = sql.into();
        if let Some(key) = key {
            fragment = fragment.with_param(key, SqlValue::Text(attribute_id.to_string()));
        }
        Ok(fragment)
    }

    fn pattern(
        attribute_id: Uuid,
        op: &str,
        prefix: &str,
        suffix: &str,
        value: &serde_json::Value,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> Result<SqlFragment, ValidationIssue> {
        let text = Self::text_literal(attribute_id, value)?;
        let key = generator.next("attr");
        let param = generator.next("like");
        let sql = format!(
            "{} {} {}",
            Self::accessor(alias, &key),
            op,
            placeholder(&param)
        );
        let pattern = format!("{}{}{}", prefix, escape_like(&text), suffix);
        Ok(SqlFragment::new(sql)
            .with_param(key, SqlValue::Text(attribute_id.to_string()))
            .with_param(param, SqlValue::Text(pattern)))
    }

    /// Missing key and JSON null both extract to SQL NULL.
    fn null_check(
        attribute_id: Uuid,
        is_null: bool,
        generator: &mut ParameterNameGenerator,
        alias: &str,
    ) -> SqlFragment {
        let key = generator.next("attr");
        let test = if is_null { "IS NULL" } else { "IS NOT NULL" };
        SqlFragment::new(format!("{} {}", Self::accessor(alias, &key), test))
            .with_param(key, SqlValue::Text(attribute_id.to_string()))
    }

    fn accessor(alias: &str, key_param: &str) -> String {
        format!("({}.payload -> {} ->> 'value')", alias, placeholder(key_param))
    }

    /// `{"<attribute id>": {"value": <value>}}`
    fn containment_document(attribute_id: Uuid, value: &serde_json::Value) -> serde_json::Value {
        let mut slot = serde_json::Map::with_capacity(1);
        slot.insert("value".to_string(), value.clone());
        let mut doc = serde_json::Map::with_capacity(1);
        doc.insert(attribute_id.to_string(), serde_json::Value::Object(slot));
        serde_json::Value::Object(doc)
    }

    /// Text form matching what `->>` yields for a stored scalar.
    fn text_literal(
        attribute_id: Uuid,
        value: &serde_json::Value,
    ) -> Result<String, ValidationIssue> {
        match value {
            serde_json::Value::String(s) => Ok(s.clone()),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            serde_json::Value::Bool(b) => Ok(b.to_string()),
            serde_json::Value::Null => Err(invalid(attribute_id, "null is not comparable")),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err(invalid(attribute_id, "expected a scalar value"))
            }
        }
    }

    /// Exact decimal text of a numeric literal. Never goes through `f64`.
    fn numeric_literal(
        attribute_id: Uuid,
        value: &serde_json::Value,
    ) -> Result<String, ValidationIssue> {
        let text = match value {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.trim().to_string(),
            _ => return Err(invalid(attribute_id, "expected a numeric value")),
        };
        if is_decimal(&text) {
            Ok(text)
        } else {
            Err(invalid(attribute_id, "expected a numeric value"))
        }
    }

    fn list_items(
        attribute_id: Uuid,
        value: &serde_json::Value,
    ) -> Result<&[serde_json::Value], ValidationIssue> {
        let Some(items) = value.as_array() else {
            return Err(invalid(attribute_id, "expected a list of values"));
        };
        if items
            .iter()
            .any(|item| item.is_null() || item.is_array() || item.is_object())
        {
            return Err(invalid(attribute_id, "list items must be non-null scalars"));
        }
        Ok(items)
    }
}

fn invalid(attribute_id: Uuid, reason: &str) -> ValidationIssue {
    ValidationIssue::InvalidFilterValue {
        attribute_id,
        reason: reason.to_string(),
    }
}

/// `-?digits(.digits)?` with an optional exponent, the forms `::numeric` accepts.
fn is_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
        None => (unsigned, None),
    };
    let (whole, fraction) = match mantissa.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (mantissa, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    digits(whole)
        && fraction.is_none_or(digits)
        && exponent
            .map(|e| e.strip_prefix(['+', '-']).unwrap_or(e))
            .is_none_or(digits)
}

/// Escapes LIKE wildcards so user text only ever matches literally.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
