//! Single-record link inspection.
//!
//! Read-only: reports the state of one record's association and never
//! repairs it. Repairs are the reconciliation engine's job.

use serde::{Deserialize, Serialize};

use shadowlink_core::{MirrorId, Relationship, ShadowlinkResult, SourceId};

use crate::repository::{RecordRef, SyncStores};

/// State of one record's association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Linked both ways and in sync.
    Intact,
    /// No association recorded.
    Unlinked,
    /// The recorded counterpart does not exist (or is not a live record of
    /// the relationship).
    Dangling,
    /// The counterpart does not point back.
    OneSided,
    /// Linked both ways but name/slug differ.
    Drifted,
    /// The record is missing, of another kind, or unpublished.
    NotApplicable,
}

impl LinkState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intact => "intact",
            Self::Unlinked => "unlinked",
            Self::Dangling => "dangling",
            Self::OneSided => "one_sided",
            Self::Drifted => "drifted",
            Self::NotApplicable => "not_applicable",
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a link check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCheck {
    /// Record checked (`source:<id>` or `mirror:<id>`).
    pub record: String,
    /// Relationship the check was made against.
    pub relationship: Relationship,
    /// Verdict.
    pub state: LinkState,
    /// Counterpart recorded in the association, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<String>,
    /// Human-readable explanation.
    pub detail: String,
}

impl LinkCheck {
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.state == LinkState::Intact
    }
}

/// Reports whether single records are correctly linked.
pub struct LinkInspector {
    relationship: Relationship,
    stores: SyncStores,
}

impl LinkInspector {
    pub fn new(relationship: Relationship, stores: SyncStores) -> Self {
        Self {
            relationship,
            stores,
        }
    }

    fn verdict(
        &self,
        record: RecordRef,
        state: LinkState,
        counterpart: Option<RecordRef>,
        detail: impl Into<String>,
    ) -> LinkCheck {
        LinkCheck {
            record: record.to_string(),
            relationship: self.relationship.clone(),
            state,
            counterpart: counterpart.map(|c| c.to_string()),
            detail: detail.into(),
        }
    }

    /// Check a source record's link.
    pub async fn check_source(&self, id: SourceId) -> ShadowlinkResult<LinkCheck> {
        let rel = &self.relationship;
        let me = RecordRef::Source(id);

        let Some(source) = self.stores.sources.get(id).await? else {
            return Ok(self.verdict(me, LinkState::NotApplicable, None, "source record not found"));
        };
        if source.kind != rel.source_kind {
            return Ok(self.verdict(
                me,
                LinkState::NotApplicable,
                None,
                format!("record kind '{}' is not '{}'", source.kind, rel.source_kind),
            ));
        }
        if !source.is_published() {
            return Ok(self.verdict(
                me,
                LinkState::NotApplicable,
                None,
                format!("record status is '{}'", source.status),
            ));
        }

        let Some(mirror_id) = self.stores.associations.get_mirror_id(id).await? else {
            return Ok(self.verdict(me, LinkState::Unlinked, None, "no mirror recorded"));
        };
        let other = Some(RecordRef::Mirror(mirror_id));

        let mirror = match self.stores.mirrors.get(mirror_id).await? {
            Some(m) if m.kind == rel.mirror_kind => m,
            _ => {
                return Ok(self.verdict(me, LinkState::Dangling, other, "recorded mirror does not exist"));
            }
        };
        if self.stores.associations.get_source_id(mirror_id).await? != Some(id) {
            return Ok(self.verdict(me, LinkState::OneSided, other, "mirror does not point back"));
        }
        if !mirror.is_in_sync_with(&source) {
            return Ok(self.verdict(
                me,
                LinkState::Drifted,
                other,
                format!(
                    "mirror is '{}' ({}), source is '{}' ({})",
                    mirror.name, mirror.slug, source.title, source.slug
                ),
            ));
        }
        Ok(self.verdict(me, LinkState::Intact, other, "linked and in sync"))
    }

    /// Check a mirror record's link.
    pub async fn check_mirror(&self, id: MirrorId) -> ShadowlinkResult<LinkCheck> {
        let rel = &self.relationship;
        let me = RecordRef::Mirror(id);

        let mirror = match self.stores.mirrors.get(id).await? {
            Some(m) if m.kind == rel.mirror_kind => m,
            Some(m) => {
                return Ok(self.verdict(
                    me,
                    LinkState::NotApplicable,
                    None,
                    format!("record kind '{}' is not '{}'", m.kind, rel.mirror_kind),
                ));
            }
            None => {
                return Ok(self.verdict(me, LinkState::NotApplicable, None, "mirror record not found"));
            }
        };

        let Some(source_id) = self.stores.associations.get_source_id(id).await? else {
            return Ok(self.verdict(me, LinkState::Unlinked, None, "no source recorded"));
        };
        let other = Some(RecordRef::Source(source_id));

        let source = match self.stores.sources.get(source_id).await? {
            Some(s) if s.kind == rel.source_kind => s,
            _ => {
                return Ok(self.verdict(me, LinkState::Dangling, other, "recorded source does not exist"));
            }
        };
        if !source.is_published() {
            return Ok(self.verdict(
                me,
                LinkState::Dangling,
                other,
                format!("recorded source is '{}'", source.status),
            ));
        }
        if self.stores.associations.get_mirror_id(source_id).await? != Some(id) {
            return Ok(self.verdict(me, LinkState::OneSided, other, "source does not point back"));
        }
        if !mirror.is_in_sync_with(&source) {
            return Ok(self.verdict(
                me,
                LinkState::Drifted,
                other,
                format!(
                    "mirror is '{}' ({}), source is '{}' ({})",
                    mirror.name, mirror.slug, source.title, source.slug
                ),
            ));
        }
        Ok(self.verdict(me, LinkState::Intact, other, "linked and in sync"))
    }
}
