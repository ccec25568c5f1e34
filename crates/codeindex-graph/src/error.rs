//! Error types for graph store operations.
//!
//! All fallible operations return [`Result<T>`] with context-rich error messages.

use thiserror::Error;

/// Result type alias for graph store operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error type for all graph store operations.
///
/// A failed mutation never leaves the store half-applied: validation runs
/// before anything is touched.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Entity not found in the graph
    #[error("Entity not found: {entity_id}")]
    EntityNotFound {
        /// ID of the missing entity
        entity_id: String,
    },

    /// Source unit not known to the graph
    #[error("Unit not found: {unit}")]
    UnitNotFound {
        /// Unit identifier (relative path)
        unit: String,
    },

    /// A batch violated a graph invariant (foreign entity, duplicate id,
    /// edge without a source in the batch)
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error details
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl GraphError {
    /// Create an internal (invariant violation) error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a serialization error from a message and optional source.
    pub fn serialization<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialization {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_not_found_error() {
        let err = GraphError::EntityNotFound {
            entity_id: "src/a.c#fn:main".to_string(),
        };
        assert_eq!(err.to_string(), "Entity not found: src/a.c#fn:main");
    }

    #[test]
    fn test_unit_not_found_error() {
        let err = GraphError::UnitNotFound {
            unit: "lib/util.c".to_string(),
        };
        assert_eq!(err.to_string(), "Unit not found: lib/util.c");
    }

    #[test]
    fn test_internal_error() {
        let err = GraphError::internal("duplicate entity id a.c#fn:f");
        assert_eq!(
            err.to_string(),
            "Internal error: duplicate entity id a.c#fn:f"
        );
    }

    #[test]
    fn test_serialization_error_keeps_source() {
        let source = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = GraphError::serialization("Failed to parse snapshot", Some(source));
        assert_eq!(
            err.to_string(),
            "Serialization error: Failed to parse snapshot"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
