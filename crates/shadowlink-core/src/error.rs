//! Error Types
//!
//! The error taxonomy shared by every shadowlink component. Repositories,
//! the association store, trigger handlers and the reconciliation engine
//! all classify their failures into one of these variants.
//!
//! # Example
//!
//! ```
//! use shadowlink_core::{ShadowlinkError, ShadowlinkResult};
//!
//! fn lookup(slug: &str) -> ShadowlinkResult<String> {
//!     if slug.is_empty() {
//!         return Err(ShadowlinkError::validation("slug", "must not be empty"));
//!     }
//!     Err(ShadowlinkError::not_found("SourceRecord", slug))
//! }
//!
//! assert!(lookup("jane-doe").unwrap_err().is_not_found());
//! ```

use thiserror::Error;

/// Boxed underlying cause of a storage failure.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error classification shared across shadowlink.
///
/// - `Configuration` - unknown kind at registration or invocation; fatal, raised before any work
/// - `Validation` - malformed create/update payload; aborts the current item
/// - `NotFound` - stale ID; callers treat it as "nothing to do"
/// - `Repository` - transport or storage failure; fatal to a reconciliation pass
#[derive(Debug, Error)]
pub enum ShadowlinkError {
    /// Unknown or invalid configuration (e.g. an undeclared kind).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem
        message: String,
    },

    /// Malformed record payload.
    #[error("Validation error on field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// Referenced record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// The type of record that was not found
        resource: String,
        /// Identifier that was looked up
        id: String,
    },

    /// Storage or transport failure inside a repository.
    #[error("Repository error: {message}")]
    Repository {
        /// Description of the failure
        message: String,
        /// Underlying cause, when one is available
        #[source]
        source: Option<BoxedSource>,
    },
}

impl ShadowlinkError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error for a field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Create a repository error without an underlying cause.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            source: None,
        }
    }

    /// Create a repository error wrapping an underlying cause.
    pub fn repository_with_source(
        message: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Repository {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Stale references are expected when deletes race with reconciliation.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the error must stop a reconciliation pass regardless of policy.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Short machine-readable name of the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Repository { .. } => "repository",
        }
    }
}

/// Result type for shadowlink operations.
pub type ShadowlinkResult<T> = std::result::Result<T, ShadowlinkError>;
