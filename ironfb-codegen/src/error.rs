//! Error types for code generation.

use thiserror::Error;

/// Error type for code generation operations.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// IR document parsing error.
    #[error("schema parse error: {0}")]
    Parse(#[from] ironfb_schema::ParseError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Code generation error.
    #[error("generation error: {message}")]
    Generation {
        /// Error message.
        message: String,
    },

    /// Unknown type reference.
    #[error("unknown type '{type_name}' in field '{field}'")]
    UnknownType {
        /// Type name.
        type_name: String,
        /// Field name.
        field: String,
    },
}

impl CodegenError {
    /// Creates a generation error with the given message.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    /// Attaches the field being generated to an unknown type error that was
    /// raised without one.
    #[must_use]
    pub fn with_field(self, field: &str) -> Self {
        match self {
            Self::UnknownType {
                type_name,
                field: existing,
            } if existing.is_empty() => Self::UnknownType {
                type_name,
                field: field.to_string(),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_message() {
        let err = CodegenError::generation("vector of vectors in field 'grid'");
        assert_eq!(
            err.to_string(),
            "generation error: vector of vectors in field 'grid'"
        );
    }

    #[test]
    fn test_unknown_type_message() {
        let err = CodegenError::unknown_type("Weapon", "weapons");
        assert_eq!(err.to_string(), "unknown type 'Weapon' in field 'weapons'");
    }

    #[test]
    fn test_with_field_fills_missing_context() {
        let err = CodegenError::unknown_type("Weapon", "").with_field("weapons");
        assert_eq!(err.to_string(), "unknown type 'Weapon' in field 'weapons'");

        let err = CodegenError::unknown_type("Weapon", "inner").with_field("outer");
        assert_eq!(err.to_string(), "unknown type 'Weapon' in field 'inner'");
    }

    #[test]
    fn test_from_parse_error() {
        let err: CodegenError = ironfb_schema::ParseError::missing_attr("field", "offset").into();
        assert!(matches!(err, CodegenError::Parse(_)));
    }
}
