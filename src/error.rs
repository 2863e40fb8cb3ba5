use std::fmt::Display;

use uuid::Uuid;

/// A single problem found while checking a query before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    InvalidAttributeReference { attribute_id: Uuid },
    InvalidRelationshipReference { relationship_id: Uuid },
    RelationshipDepthExceeded { depth: usize, max_depth: usize },
    InvalidPagination(String),
    InvalidEntityId(String),
    InvalidFilterValue { attribute_id: Uuid, reason: String },
    /// A template value was left for the core to resolve.
    UnresolvedTemplate { attribute_id: Uuid, expression: String },
    UnsupportedCondition(&'static str),
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::InvalidAttributeReference { attribute_id } => {
                write!(f, "Unknown attribute: {}", attribute_id)
            }
            ValidationIssue::InvalidRelationshipReference { relationship_id } => {
                write!(f, "Unknown relationship: {}", relationship_id)
            }
            ValidationIssue::RelationshipDepthExceeded { depth, max_depth } => write!(
                f,
                "Relationship depth {} exceeds maximum of {}",
                depth, max_depth
            ),
            ValidationIssue::InvalidPagination(msg) => write!(f, "Invalid pagination: {}", msg),
            ValidationIssue::InvalidEntityId(id) => write!(f, "Invalid entity id: {}", id),
            ValidationIssue::InvalidFilterValue {
                attribute_id,
                reason,
            } => write!(f, "Invalid value for attribute {}: {}", attribute_id, reason),
            ValidationIssue::UnresolvedTemplate {
                attribute_id,
                expression,
            } => write!(
                f,
                "Unresolved template for attribute {}: {}",
                attribute_id, expression
            ),
            ValidationIssue::UnsupportedCondition(name) => {
                write!(f, "Unsupported relationship condition: {}", name)
            }
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// Every issue found in the query, reported together.
    Validation(Vec<ValidationIssue>),
    EntityTypeNotFound(Uuid),
    /// Boolean nesting (And/Or) went deeper than the configured limit.
    FilterDepthExceeded {
        depth: usize,
        max_depth: usize,
    },
    /// A `FilterValue::Template` reached SQL generation without being resolved.
    UnresolvedTemplate(String),
    Unsupported(String),
    Execution {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    Deserialize(String),
}

impl Error {
    pub fn validation(issue: ValidationIssue) -> Self {
        Error::Validation(vec![issue])
    }

    pub fn execution<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Execution {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Error::Validation(issues) => issues,
            _ => &[],
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation(issues) => {
                write!(f, "Query validation failed")?;
                for (i, issue) in issues.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{}{}", sep, issue)?;
                }
                Ok(())
            }
            Error::EntityTypeNotFound(id) => write!(f, "Entity type not found: {}", id),
            Error::FilterDepthExceeded { depth, max_depth } => write!(
                f,
                "Filter nesting depth {} exceeds maximum of {}",
                depth, max_depth
            ),
            Error::UnresolvedTemplate(expr) => {
                write!(f, "Unresolved template value reached query compilation: {}", expr)
            }
            Error::Unsupported(msg) => write!(f, "Unsupported operation: {}", msg),
            Error::Execution { message, source } => match source {
                Some(source) => write!(f, "Execution error: {}: {}", message, source),
                None => write!(f, "Execution error: {}", message),
            },
            Error::Deserialize(err) => write!(f, "Deserialization error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Execution {
                source: Some(source),
                ..
            } => Some(source.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_lists_every_issue() {
        let err = Error::Validation(vec![
            ValidationIssue::InvalidPagination("limit must be between 1 and 500".into()),
            ValidationIssue::RelationshipDepthExceeded {
                depth: 2,
                max_depth: 1,
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("limit must be between 1 and 500"));
        assert!(msg.contains("Relationship depth 2 exceeds maximum of 1"));
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_execution_preserves_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "statement timeout");
        let err = Error::execution("count query failed", io);
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("statement timeout"));
    }
}
