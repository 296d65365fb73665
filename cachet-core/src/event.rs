//! Change notification events.
//!
//! Every committed mutation against the persistent container emits one
//! `ChangeEvent` onto the process-wide broadcast bus. Subscribers filter
//! with an [`EventFilter`] allow-list; an empty filter admits everything.

use crate::enums::{ChangeKind, EntityKind};
use crate::RecordId;
use serde::{Deserialize, Serialize};

/// A notification describing an insert/update/delete/batch-completion
/// against a known entity kind.
///
/// Broadcast semantics: delivered at-most-once per subscriber per emission.
/// A subscriber not currently listening misses the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChangeEvent {
    /// A new record was committed.
    Inserted { kind: EntityKind, id: RecordId },
    /// An existing record was overwritten.
    Updated { kind: EntityKind, id: RecordId },
    /// A record was removed.
    Deleted { kind: EntityKind, id: RecordId },
    /// A single record of this kind changed; incremental refresh suffices.
    ItemChanged { kind: EntityKind },
    /// A unit of work touching this kind committed; the whole visible
    /// result set may have changed.
    BatchCompleted { kind: EntityKind },
}

impl ChangeEvent {
    /// Get the event type as a string for logging/debugging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ChangeEvent::Inserted { .. } => "Inserted",
            ChangeEvent::Updated { .. } => "Updated",
            ChangeEvent::Deleted { .. } => "Deleted",
            ChangeEvent::ItemChanged { .. } => "ItemChanged",
            ChangeEvent::BatchCompleted { .. } => "BatchCompleted",
        }
    }

    /// The entity kind this event is about.
    pub fn kind(&self) -> EntityKind {
        match self {
            ChangeEvent::Inserted { kind, .. }
            | ChangeEvent::Updated { kind, .. }
            | ChangeEvent::Deleted { kind, .. }
            | ChangeEvent::ItemChanged { kind }
            | ChangeEvent::BatchCompleted { kind } => *kind,
        }
    }

    /// The change variant, for allow-list matching.
    pub fn change_kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Inserted { .. } => ChangeKind::Inserted,
            ChangeEvent::Updated { .. } => ChangeKind::Updated,
            ChangeEvent::Deleted { .. } => ChangeKind::Deleted,
            ChangeEvent::ItemChanged { .. } => ChangeKind::ItemChanged,
            ChangeEvent::BatchCompleted { .. } => ChangeKind::BatchCompleted,
        }
    }

    /// The record id, for variants that carry one.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            ChangeEvent::Inserted { id, .. }
            | ChangeEvent::Updated { id, .. }
            | ChangeEvent::Deleted { id, .. } => Some(*id),
            ChangeEvent::ItemChanged { .. } | ChangeEvent::BatchCompleted { .. } => None,
        }
    }
}

/// Allow-list filter for change-event subscriptions.
///
/// An empty list on either axis means "no restriction on that axis".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Entity kinds to admit; empty admits all kinds.
    pub kinds: Vec<EntityKind>,
    /// Change variants to admit; empty admits all variants.
    pub changes: Vec<ChangeKind>,
}

impl EventFilter {
    /// A filter that admits every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one entity kind.
    pub fn for_kind(kind: EntityKind) -> Self {
        Self {
            kinds: vec![kind],
            changes: Vec::new(),
        }
    }

    /// Restrict to specific change variants.
    pub fn with_changes(mut self, changes: Vec<ChangeKind>) -> Self {
        self.changes = changes;
        self
    }

    /// Whether the given event passes this filter.
    pub fn admits(&self, event: &ChangeEvent) -> bool {
        let kind_ok = self.kinds.is_empty() || self.kinds.contains(&event.kind());
        let change_ok = self.changes.is_empty() || self.changes.contains(&event.change_kind());
        kind_ok && change_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_record_id;

    #[test]
    fn test_event_type_names() {
        let id = new_record_id();
        assert_eq!(
            ChangeEvent::Inserted {
                kind: EntityKind::Bookmark,
                id
            }
            .event_type(),
            "Inserted"
        );
        assert_eq!(
            ChangeEvent::BatchCompleted {
                kind: EntityKind::Profile
            }
            .event_type(),
            "BatchCompleted"
        );
    }

    #[test]
    fn test_kind_accessor_covers_all_variants() {
        let id = new_record_id();
        let events = [
            ChangeEvent::Inserted {
                kind: EntityKind::Document,
                id,
            },
            ChangeEvent::Updated {
                kind: EntityKind::Document,
                id,
            },
            ChangeEvent::Deleted {
                kind: EntityKind::Document,
                id,
            },
            ChangeEvent::ItemChanged {
                kind: EntityKind::Document,
            },
            ChangeEvent::BatchCompleted {
                kind: EntityKind::Document,
            },
        ];
        for event in &events {
            assert_eq!(event.kind(), EntityKind::Document);
        }
    }

    #[test]
    fn test_empty_filter_admits_everything() {
        let filter = EventFilter::all();
        let event = ChangeEvent::Deleted {
            kind: EntityKind::Setting,
            id: new_record_id(),
        };
        assert!(filter.admits(&event));
    }

    #[test]
    fn test_kind_filter() {
        let filter = EventFilter::for_kind(EntityKind::Bookmark);
        let hit = ChangeEvent::ItemChanged {
            kind: EntityKind::Bookmark,
        };
        let miss = ChangeEvent::ItemChanged {
            kind: EntityKind::Profile,
        };
        assert!(filter.admits(&hit));
        assert!(!filter.admits(&miss));
    }

    #[test]
    fn test_change_variant_filter() {
        let filter =
            EventFilter::for_kind(EntityKind::Bookmark).with_changes(vec![ChangeKind::Deleted]);
        let deleted = ChangeEvent::Deleted {
            kind: EntityKind::Bookmark,
            id: new_record_id(),
        };
        let inserted = ChangeEvent::Inserted {
            kind: EntityKind::Bookmark,
            id: new_record_id(),
        };
        assert!(filter.admits(&deleted));
        assert!(!filter.admits(&inserted));
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = ChangeEvent::Updated {
            kind: EntityKind::Conversation,
            id: new_record_id(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: ChangeEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, back);
    }
}
