//! Kinds and relationships
//!
//! A [`Relationship`] pairs one source kind with one mirror kind. It is
//! declared at process start, never persisted, and immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{ShadowlinkError, ShadowlinkResult};

/// Longest accepted kind name.
pub const MAX_KIND_LEN: usize = 32;

/// Check that a kind name is usable as a collection key.
///
/// Kind names are lowercase ASCII letters, digits, `-` and `_`.
pub fn validate_kind_name(kind: &str) -> ShadowlinkResult<()> {
    if kind.is_empty() {
        return Err(ShadowlinkError::configuration("kind name must not be empty"));
    }
    if kind.len() > MAX_KIND_LEN {
        return Err(ShadowlinkError::configuration(format!(
            "kind name '{kind}' is longer than {MAX_KIND_LEN} characters"
        )));
    }
    if !kind
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ShadowlinkError::configuration(format!(
            "kind name '{kind}' may only contain lowercase letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

/// A configured (source kind, mirror kind) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relationship {
    /// Kind of the source collection.
    pub source_kind: String,
    /// Kind of the mirror collection.
    pub mirror_kind: String,
}

impl Relationship {
    /// Create a relationship, validating both kind names.
    pub fn new(
        source_kind: impl Into<String>,
        mirror_kind: impl Into<String>,
    ) -> ShadowlinkResult<Self> {
        let source_kind = source_kind.into();
        let mirror_kind = mirror_kind.into();
        validate_kind_name(&source_kind)?;
        validate_kind_name(&mirror_kind)?;
        Ok(Self {
            source_kind,
            mirror_kind,
        })
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source_kind, self.mirror_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_relationship() {
        let rel = Relationship::new("staff", "offices").unwrap();
        assert_eq!(rel.source_kind, "staff");
        assert_eq!(rel.mirror_kind, "offices");
        assert_eq!(rel.to_string(), "staff -> offices");
    }

    #[test]
    fn test_rejects_bad_kind_names() {
        assert!(Relationship::new("", "offices").is_err());
        assert!(Relationship::new("Staff", "offices").is_err());
        assert!(Relationship::new("staff", "office list").is_err());
        assert!(Relationship::new("staff", "x".repeat(MAX_KIND_LEN + 1)).is_err());
    }

    #[test]
    fn test_kind_name_errors_are_configuration_errors() {
        let err = validate_kind_name("Bad Kind").unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
