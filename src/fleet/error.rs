//! Errors raised while reconciling a fleet

use thiserror::Error;

use super::kind::ManagedResourceKind;
use crate::store::StoreError;

/// Manifest template could not be loaded or materialized
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The manifest source could not provide the manifest
    #[error("failed to load {kind} manifest: {message}")]
    Load {
        /// Kind whose manifest was requested
        kind: ManagedResourceKind,
        /// Description of what failed
        message: String,
    },

    /// The manifest is not a YAML document
    #[error("{kind} manifest is not valid YAML: {message}")]
    Parse {
        /// Kind whose manifest failed to parse
        kind: ManagedResourceKind,
        /// Parser message
        message: String,
    },

    /// The substituted document does not describe a valid resource of the kind
    #[error("materialized manifest is not a valid {kind}: {message}")]
    Invalid {
        /// Kind the manifest should describe
        kind: ManagedResourceKind,
        /// Deserializer message
        message: String,
    },
}

impl TemplateError {
    /// Create a load error
    pub fn load(kind: ManagedResourceKind, msg: impl Into<String>) -> Self {
        Self::Load {
            kind,
            message: msg.into(),
        }
    }

    /// Create a parse error
    pub fn parse(kind: ManagedResourceKind, msg: impl Into<String>) -> Self {
        Self::Parse {
            kind,
            message: msg.into(),
        }
    }

    /// Create an invalid-resource error
    pub fn invalid(kind: ManagedResourceKind, msg: impl Into<String>) -> Self {
        Self::Invalid {
            kind,
            message: msg.into(),
        }
    }
}

/// The name of an existing resource does not end in a valid instance index
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot read instance index of {name}: {reason}")]
pub struct IndexParseError {
    /// Name of the existing resource
    pub name: String,
    /// Why the suffix was rejected
    pub reason: String,
}

/// Creation of a single instance failed
#[derive(Debug, Error)]
pub enum CreationError {
    /// The manifest could not be turned into a resource
    #[error("instance {index}: {source}")]
    Template {
        /// Instance index
        index: u32,
        /// Underlying template error
        source: TemplateError,
    },

    /// The resource store rejected the resource
    #[error("instance {index}: {source}")]
    Store {
        /// Instance index
        index: u32,
        /// Underlying store error
        source: StoreError,
    },
}

impl CreationError {
    /// Index of the instance that failed
    pub fn index(&self) -> u32 {
        match self {
            Self::Template { index, .. } | Self::Store { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_errors_carry_the_index() {
        let err = CreationError::Template {
            index: 3,
            source: TemplateError::invalid(ManagedResourceKind::Endpoint, "missing field `spec`"),
        };
        assert_eq!(err.index(), 3);
        assert!(err.to_string().starts_with("instance 3:"));
        assert!(err.to_string().contains("not a valid Service"));
    }

    #[test]
    fn index_parse_error_names_the_resource() {
        let err = IndexParseError {
            name: "ping-service-x".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        assert!(err.to_string().contains("ping-service-x"));
    }
}
