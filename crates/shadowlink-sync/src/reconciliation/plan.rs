//! Reconciliation plan.
//!
//! The read-only result of scanning both collections. A dry run reports it;
//! a live pass applies it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use shadowlink_core::{MirrorFields, MirrorId, SourceId};

use super::types::ActionType;

/// One planned repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    /// What will be done.
    pub action: ActionType,
    /// Source side, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
    /// Mirror side, if any (absent for creates).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_id: Option<MirrorId>,
    /// Mirror name after the action (current name for deletes).
    pub name: String,
    /// Mirror slug after the action (current slug for deletes).
    pub slug: String,
}

impl PlanItem {
    pub(crate) fn create(source_id: SourceId, fields: MirrorFields) -> Self {
        Self {
            action: ActionType::Create,
            source_id: Some(source_id),
            mirror_id: None,
            name: fields.name,
            slug: fields.slug,
        }
    }

    pub(crate) fn update(source_id: SourceId, mirror_id: MirrorId, fields: MirrorFields) -> Self {
        Self {
            action: ActionType::Update,
            source_id: Some(source_id),
            mirror_id: Some(mirror_id),
            name: fields.name,
            slug: fields.slug,
        }
    }

    pub(crate) fn delete(mirror_id: MirrorId, name: String, slug: String) -> Self {
        Self {
            action: ActionType::Delete,
            source_id: None,
            mirror_id: Some(mirror_id),
            name,
            slug,
        }
    }

    pub(crate) fn link(source_id: SourceId, mirror_id: MirrorId, fields: MirrorFields) -> Self {
        Self {
            action: ActionType::Link,
            source_id: Some(source_id),
            mirror_id: Some(mirror_id),
            name: fields.name,
            slug: fields.slug,
        }
    }

    /// Target mirror fields.
    #[must_use]
    pub fn fields(&self) -> MirrorFields {
        MirrorFields {
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }

    /// Identity of the record the action is about, for error reports.
    #[must_use]
    pub fn record_label(&self) -> String {
        match (self.source_id, self.mirror_id) {
            (_, Some(mirror_id)) if self.action == ActionType::Delete => format!("mirror:{mirror_id}"),
            (Some(source_id), _) => format!("source:{source_id}"),
            (None, Some(mirror_id)) => format!("mirror:{mirror_id}"),
            (None, None) => format!("slug:{}", self.slug),
        }
    }
}

/// Every repair a pass found, grouped by action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    /// Published sources with no mirror.
    pub to_create: Vec<PlanItem>,
    /// Linked mirrors whose name/slug drifted.
    pub to_update: Vec<PlanItem>,
    /// Mirrors with no valid source.
    pub to_delete: Vec<PlanItem>,
    /// Pairs that only need association metadata.
    pub to_link: Vec<PlanItem>,
    #[serde(skip)]
    claimed_sources: HashSet<SourceId>,
    #[serde(skip)]
    claimed_mirrors: HashSet<MirrorId>,
}

impl ReconciliationPlan {
    /// Empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total planned actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len() + self.to_link.len()
    }

    /// Whether there is nothing to repair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items for one action.
    #[must_use]
    pub fn items(&self, action: ActionType) -> &[PlanItem] {
        match action {
            ActionType::Create => &self.to_create,
            ActionType::Update => &self.to_update,
            ActionType::Delete => &self.to_delete,
            ActionType::Link => &self.to_link,
        }
    }

    /// All items in apply order.
    pub fn iter(&self) -> impl Iterator<Item = &PlanItem> {
        ActionType::APPLY_ORDER
            .into_iter()
            .flat_map(move |action| self.items(action).iter())
    }

    /// Whether a source already has a verdict in this plan.
    #[must_use]
    pub fn is_source_claimed(&self, id: SourceId) -> bool {
        self.claimed_sources.contains(&id)
    }

    /// Whether a mirror is kept by this plan (linked, updated or valid).
    #[must_use]
    pub fn is_mirror_claimed(&self, id: MirrorId) -> bool {
        self.claimed_mirrors.contains(&id)
    }

    /// Record a valid pair that needs no action.
    pub(crate) fn keep(&mut self, source_id: SourceId, mirror_id: MirrorId) {
        self.claimed_sources.insert(source_id);
        self.claimed_mirrors.insert(mirror_id);
    }

    /// Add an item, claiming the records it touches.
    ///
    /// Returns `false` (and drops the item) when a claimed mirror would be
    /// deleted or a record would get a second verdict.
    pub(crate) fn push(&mut self, item: PlanItem) -> bool {
        if item.action == ActionType::Delete {
            let Some(mirror_id) = item.mirror_id else {
                return false;
            };
            if !self.claimed_mirrors.insert(mirror_id) {
                return false;
            }
        } else {
            if item.source_id.is_some_and(|id| self.claimed_sources.contains(&id)) {
                return false;
            }
            if item.mirror_id.is_some_and(|id| self.claimed_mirrors.contains(&id)) {
                return false;
            }
            if let Some(id) = item.source_id {
                self.claimed_sources.insert(id);
            }
            if let Some(id) = item.mirror_id {
                self.claimed_mirrors.insert(id);
            }
        }

        match item.action {
            ActionType::Create => self.to_create.push(item),
            ActionType::Update => self.to_update.push(item),
            ActionType::Delete => self.to_delete.push(item),
            ActionType::Link => self.to_link.push(item),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(slug: &str) -> MirrorFields {
        MirrorFields {
            name: slug.to_uppercase(),
            slug: slug.to_string(),
        }
    }

    #[test]
    fn test_linked_mirror_is_never_deleted() {
        let mut plan = ReconciliationPlan::new();
        let (s, m) = (SourceId::new(), MirrorId::new());

        assert!(plan.push(PlanItem::link(s, m, fields("a"))));
        assert!(!plan.push(PlanItem::delete(m, "A".into(), "a".into())));

        assert_eq!(plan.to_link.len(), 1);
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_source_gets_one_verdict() {
        let mut plan = ReconciliationPlan::new();
        let s = SourceId::new();

        assert!(plan.push(PlanItem::link(s, MirrorId::new(), fields("a"))));
        assert!(!plan.push(PlanItem::link(s, MirrorId::new(), fields("a"))));
        assert!(!plan.push(PlanItem::create(s, fields("a"))));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_kept_pair_blocks_delete() {
        let mut plan = ReconciliationPlan::new();
        let (s, m) = (SourceId::new(), MirrorId::new());
        plan.keep(s, m);

        assert!(!plan.push(PlanItem::delete(m, "A".into(), "a".into())));
        assert!(plan.is_empty());
        assert!(plan.is_source_claimed(s));
    }

    #[test]
    fn test_iter_follows_apply_order() {
        let mut plan = ReconciliationPlan::new();
        plan.push(PlanItem::link(SourceId::new(), MirrorId::new(), fields("l")));
        plan.push(PlanItem::delete(MirrorId::new(), "D".into(), "d".into()));
        plan.push(PlanItem::create(SourceId::new(), fields("c")));
        plan.push(PlanItem::update(SourceId::new(), MirrorId::new(), fields("u")));

        let actions: Vec<ActionType> = plan.iter().map(|i| i.action).collect();
        assert_eq!(actions, ActionType::APPLY_ORDER.to_vec());
    }

    #[test]
    fn test_record_label() {
        let s = SourceId::new();
        let m = MirrorId::new();
        assert_eq!(PlanItem::create(s, fields("a")).record_label(), format!("source:{s}"));
        assert_eq!(
            PlanItem::delete(m, "A".into(), "a".into()).record_label(),
            format!("mirror:{m}")
        );
    }
}
