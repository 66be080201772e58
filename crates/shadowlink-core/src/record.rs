//! Record model
//!
//! Source records are the primary items; mirror records are lightweight
//! proxies that carry a copy of the source's identity fields
//! (`title` -> `name`, `slug` -> `slug`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MirrorId, SourceId};

/// Publication status of a source record.
///
/// Only [`RecordStatus::Published`] records take part in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    /// Live record.
    #[default]
    #[serde(rename = "publish", alias = "published")]
    Published,
    /// Saved but not published.
    Draft,
    /// Awaiting review.
    Pending,
    /// Visible only to privileged users.
    Private,
    /// Placeholder created while an editor is still filling the record in.
    AutoDraft,
    /// Soft-deleted.
    Trash,
}

impl RecordStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Published => "publish",
            RecordStatus::Draft => "draft",
            RecordStatus::Pending => "pending",
            RecordStatus::Private => "private",
            RecordStatus::AutoDraft => "auto-draft",
            RecordStatus::Trash => "trash",
        }
    }

    /// Whether records in this status participate in sync.
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self, RecordStatus::Published)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "publish" | "published" => Ok(RecordStatus::Published),
            "draft" => Ok(RecordStatus::Draft),
            "pending" => Ok(RecordStatus::Pending),
            "private" => Ok(RecordStatus::Private),
            "auto-draft" | "auto_draft" => Ok(RecordStatus::AutoDraft),
            "trash" => Ok(RecordStatus::Trash),
            _ => Err(format!("Unknown record status: {s}")),
        }
    }
}

/// Metadata attached to a record (string keys to scalar values).
pub type RecordMeta = BTreeMap<String, String>;

/// An item of the primary kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Record ID.
    pub id: SourceId,
    /// Configured source kind.
    pub kind: String,
    /// Display name.
    pub title: String,
    /// Unique-within-kind identity string.
    pub slug: String,
    /// Publication status.
    #[serde(default)]
    pub status: RecordStatus,
    /// Attached metadata (holds the association key).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: RecordMeta,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

impl SourceRecord {
    /// Whether this record participates in sync.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status.is_published()
    }

    /// Fields the mirror of this record must carry.
    #[must_use]
    pub fn mirror_fields(&self) -> MirrorFields {
        MirrorFields {
            name: self.title.clone(),
            slug: self.slug.clone(),
        }
    }
}

/// A lightweight proxy entry of the secondary kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    /// Record ID.
    pub id: MirrorId,
    /// Configured mirror kind.
    pub kind: String,
    /// Mirrors the source's `title`.
    pub name: String,
    /// Mirrors the source's `slug`.
    pub slug: String,
    /// Attached metadata (holds the association key).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: RecordMeta,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

impl MirrorRecord {
    /// The "in sync" predicate: `name == title` and `slug == slug`.
    #[must_use]
    pub fn is_in_sync_with(&self, source: &SourceRecord) -> bool {
        self.name == source.title && self.slug == source.slug
    }

    /// Fields of a source record originated from this mirror.
    #[must_use]
    pub fn source_fields(&self) -> SourceFields {
        SourceFields {
            title: self.name.clone(),
            slug: self.slug.clone(),
            status: RecordStatus::Published,
        }
    }
}

/// Payload for creating a source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSource {
    /// Target kind.
    pub kind: String,
    /// Display name.
    pub title: String,
    /// Identity string.
    pub slug: String,
    /// Initial status.
    #[serde(default)]
    pub status: RecordStatus,
}

impl NewSource {
    /// Build a create payload from replacement fields.
    #[must_use]
    pub fn from_fields(kind: impl Into<String>, fields: SourceFields) -> Self {
        Self {
            kind: kind.into(),
            title: fields.title,
            slug: fields.slug,
            status: fields.status,
        }
    }
}

/// Replacement fields of a source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFields {
    /// Display name.
    pub title: String,
    /// Identity string.
    pub slug: String,
    /// Status.
    #[serde(default)]
    pub status: RecordStatus,
}

/// Payload for creating a mirror record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMirror {
    /// Target kind.
    pub kind: String,
    /// Display name copied from the source's title.
    pub name: String,
    /// Identity string copied from the source's slug.
    pub slug: String,
}

impl NewMirror {
    /// Build a create payload from replacement fields.
    #[must_use]
    pub fn from_fields(kind: impl Into<String>, fields: MirrorFields) -> Self {
        Self {
            kind: kind.into(),
            name: fields.name,
            slug: fields.slug,
        }
    }
}

/// Replacement fields of a mirror record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorFields {
    /// Display name.
    pub name: String,
    /// Identity string.
    pub slug: String,
}
