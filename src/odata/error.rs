//! Client-side query errors.

use crate::entity::EdmType;
use std::fmt;

/// A query option was disallowed, unsupported or malformed.
///
/// Every variant maps to `400 Bad Request`; [`code`](Self::code) and
/// [`target`](Self::target) populate the OData error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The option exists but the endpoint's capability set forbids it.
    NotAllowed { option: &'static str },
    /// `$`-prefixed option this service does not implement.
    Unsupported { option: String },
    /// The same option appeared twice.
    Duplicate { option: String },
    /// The option value is not of the expected shape.
    InvalidValue {
        option: &'static str,
        value: String,
        reason: String,
    },
    /// A property name that is not declared on the entity type.
    UnknownProperty {
        option: &'static str,
        property: String,
    },
    /// `$expand` named something that is not a navigation property.
    NotNavigation { property: String },
    /// Operand type does not match the property type.
    TypeMismatch {
        property: String,
        expected: EdmType,
        found: &'static str,
    },
    /// `$filter` or `$orderby` could not be parsed.
    Syntax {
        option: &'static str,
        position: usize,
        message: String,
    },
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::NotAllowed { .. } => "query_option_not_allowed",
            ValidationError::Unsupported { .. } => "query_option_not_supported",
            ValidationError::Duplicate { .. } => "duplicate_query_option",
            ValidationError::InvalidValue { .. } => "invalid_query_option_value",
            ValidationError::UnknownProperty { .. } => "unknown_property",
            ValidationError::NotNavigation { .. } => "invalid_expand",
            ValidationError::TypeMismatch { .. } => "type_mismatch",
            ValidationError::Syntax { .. } => "syntax_error",
        }
    }

    /// Query option the error refers to.
    pub fn target(&self) -> String {
        match self {
            ValidationError::NotAllowed { option }
            | ValidationError::InvalidValue { option, .. }
            | ValidationError::UnknownProperty { option, .. }
            | ValidationError::Syntax { option, .. } => (*option).to_string(),
            ValidationError::Unsupported { option } | ValidationError::Duplicate { option } => {
                option.clone()
            }
            ValidationError::NotNavigation { .. } => "$expand".to_string(),
            ValidationError::TypeMismatch { .. } => "$filter".to_string(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NotAllowed { option } => {
                write!(f, "Query option '{option}' is not allowed on this endpoint")
            }
            ValidationError::Unsupported { option } => {
                write!(f, "The query parameter '{option}' is not supported")
            }
            ValidationError::Duplicate { option } => {
                write!(f, "Query option '{option}' was specified more than once")
            }
            ValidationError::InvalidValue { option, value, reason } => {
                write!(f, "Invalid value '{value}' for query option '{option}': {reason}")
            }
            ValidationError::UnknownProperty { option, property } => write!(
                f,
                "Could not find a property named '{property}' (in '{option}')"
            ),
            ValidationError::NotNavigation { property } => write!(
                f,
                "Property '{property}' is not a navigation property and cannot be expanded"
            ),
            ValidationError::TypeMismatch { property, expected, found } => write!(
                f,
                "Property '{property}' of type '{expected}' cannot be compared with a {found}"
            ),
            ValidationError::Syntax { option, position, message } => {
                write!(f, "Syntax error in '{option}' at position {position}: {message}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_targets() {
        let err = ValidationError::NotAllowed { option: "$select" };
        assert_eq!(err.code(), "query_option_not_allowed");
        assert_eq!(err.target(), "$select");
        assert!(err.to_string().contains("$select"));

        let err = ValidationError::TypeMismatch {
            property: "id".into(),
            expected: EdmType::Int32,
            found: "string literal",
        };
        assert_eq!(err.target(), "$filter");
        assert!(err.to_string().contains("Edm.Int32"));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = ValidationError::Syntax {
            option: "$filter",
            position: 7,
            message: "unexpected ')'".into(),
        };
        assert!(err.to_string().contains("position 7"));
    }
}
