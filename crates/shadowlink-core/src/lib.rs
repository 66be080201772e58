//! shadowlink Core Library
//!
//! Shared types for shadowlink.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (SourceId, MirrorId)
//! - [`record`] - Source and mirror records and their field payloads
//! - [`kind`] - Kind names and the (source kind, mirror kind) relationship
//! - [`error`] - The error taxonomy (ShadowlinkError)
//!
//! # Example
//!
//! ```
//! use shadowlink_core::{Relationship, ShadowlinkResult};
//!
//! fn staff_offices() -> ShadowlinkResult<Relationship> {
//!     Relationship::new("staff", "offices")
//! }
//!
//! assert_eq!(staff_offices().unwrap().to_string(), "staff -> offices");
//! ```

pub mod error;
pub mod ids;
pub mod kind;
pub mod record;

pub use error::{ShadowlinkError, ShadowlinkResult};
pub use ids::{MirrorId, ParseIdError, SourceId};
pub use kind::{validate_kind_name, Relationship};
pub use record::{
    MirrorFields, MirrorRecord, NewMirror, NewSource, RecordMeta, RecordStatus, SourceFields,
    SourceRecord,
};

/// Metadata key on a source record holding its mirror's ID.
pub const MIRROR_ID_META_KEY: &str = "shadow_mirror_id";

/// Metadata key on a mirror record holding its source's ID.
pub const SOURCE_ID_META_KEY: &str = "shadow_source_id";
