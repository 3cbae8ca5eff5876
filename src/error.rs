//! Error taxonomy for dataset construction and mutation.
//!
//! Every core operation returns [`Result`] and fails at the point of
//! violation. Nothing here is retried or recovered internally: the caller
//! sees the specific variant and decides what to do with it. The I/O layer
//! wraps these in `anyhow::Error` with file/row context.

use thiserror::Error;

/// Errors raised by the dataset model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    /// Malformed attribute declaration (empty name, nominal without values, ...).
    #[error("invalid attribute '{name}': {reason}")]
    InvalidAttribute { name: String, reason: String },

    /// An attribute with this name already exists in the schema.
    #[error("attribute '{0}' already exists")]
    DuplicateAttribute(String),

    /// An external value cannot be represented under the attribute's kind.
    #[error("cannot coerce '{value}' for attribute '{attribute}': {reason}")]
    ValueCoercion {
        attribute: String,
        value: String,
        reason: String,
    },

    /// A lookup by name referenced an attribute that is not in the schema.
    #[error("attribute '{0}' is not defined")]
    UndefinedAttribute(String),

    /// Two schemas (or a row and a schema) do not line up.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Instance weights must be finite and non-negative.
    #[error("invalid instance weight {0}")]
    InvalidWeight(f64),
}

pub type Result<T, E = DatasetError> = std::result::Result<T, E>;

impl DatasetError {
    pub(crate) fn coercion(
        attribute: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        DatasetError::ValueCoercion {
            attribute: attribute.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_attribute(name: &str, reason: impl Into<String>) -> Self {
        DatasetError::InvalidAttribute {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_attribute() {
        let err = DatasetError::coercion("label", "maybe", "not a declared label");
        assert_eq!(
            err.to_string(),
            "cannot coerce 'maybe' for attribute 'label': not a declared label"
        );
        assert_eq!(
            DatasetError::UndefinedAttribute("target".into()).to_string(),
            "attribute 'target' is not defined"
        );
    }
}
