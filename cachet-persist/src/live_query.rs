//! Per-kind live-query controllers.
//!
//! A live query is the persistence manager's notification surface for one
//! entity kind. Controllers are instantiated lazily on first use and stay
//! alive for the life of the hub; they carry no result set themselves, only
//! the state needed to tell subscribers *how much* changed: one item
//! (`ItemChanged`, incremental refresh suffices) or a whole unit of work
//! (`BatchCompleted`, the visible result set may have changed shape).

use std::collections::HashMap;
use std::sync::RwLock;

use cachet_core::{ChangeEvent, EntityKind};
use tracing::{debug, warn};

use crate::bus::ChangeBus;

/// Lifecycle state of one kind's live query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// No mutation of this kind has been observed yet.
    Uninitialized,
    /// The controller exists and is forwarding notifications.
    Active,
}

#[derive(Debug, Default)]
struct QueryController {
    observations: u64,
}

/// Registry of live-query controllers, one per entity kind.
pub struct LiveQueryHub {
    bus: ChangeBus,
    controllers: RwLock<HashMap<EntityKind, QueryController>>,
}

impl LiveQueryHub {
    /// Create a hub that re-emits through the given bus.
    pub fn new(bus: ChangeBus) -> Self {
        Self {
            bus,
            controllers: RwLock::new(HashMap::new()),
        }
    }

    /// One record of `kind` changed; emit an incremental notification.
    pub fn item_changed(&self, kind: EntityKind) {
        self.observe(kind);
        self.bus.publish(ChangeEvent::ItemChanged { kind });
    }

    /// A unit of work touching `kind` committed; emit a whole-set
    /// notification.
    pub fn batch_completed(&self, kind: EntityKind) {
        self.observe(kind);
        self.bus.publish(ChangeEvent::BatchCompleted { kind });
    }

    /// Current lifecycle state for `kind`.
    pub fn state(&self, kind: EntityKind) -> QueryState {
        match self.controllers.read() {
            Ok(map) if map.contains_key(&kind) => QueryState::Active,
            Ok(_) => QueryState::Uninitialized,
            Err(_) => {
                warn!(kind = kind.as_str(), "Live-query registry lock poisoned");
                QueryState::Uninitialized
            }
        }
    }

    /// Number of mutations this kind's controller has observed.
    pub fn observation_count(&self, kind: EntityKind) -> u64 {
        self.controllers
            .read()
            .ok()
            .and_then(|map| map.get(&kind).map(|c| c.observations))
            .unwrap_or(0)
    }

    fn observe(&self, kind: EntityKind) {
        match self.controllers.write() {
            Ok(mut map) => {
                let controller = map.entry(kind).or_insert_with(|| {
                    debug!(kind = kind.as_str(), "Instantiating live-query controller");
                    QueryController::default()
                });
                controller.observations += 1;
            }
            Err(_) => {
                warn!(kind = kind.as_str(), "Live-query registry lock poisoned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controllers_start_uninitialized() {
        let hub = LiveQueryHub::new(ChangeBus::new(16));
        assert_eq!(hub.state(EntityKind::Bookmark), QueryState::Uninitialized);
        assert_eq!(hub.observation_count(EntityKind::Bookmark), 0);
    }

    #[test]
    fn test_first_observation_activates_the_kind() {
        let hub = LiveQueryHub::new(ChangeBus::new(16));
        hub.item_changed(EntityKind::Bookmark);

        assert_eq!(hub.state(EntityKind::Bookmark), QueryState::Active);
        assert_eq!(hub.observation_count(EntityKind::Bookmark), 1);
        assert_eq!(hub.state(EntityKind::Profile), QueryState::Uninitialized);
    }

    #[tokio::test]
    async fn test_item_and_batch_emit_distinct_events() {
        let bus = ChangeBus::new(16);
        let mut rx = bus.subscribe();
        let hub = LiveQueryHub::new(bus);

        hub.item_changed(EntityKind::Document);
        hub.batch_completed(EntityKind::Document);

        assert_eq!(
            rx.recv().await.expect("recv"),
            ChangeEvent::ItemChanged {
                kind: EntityKind::Document
            }
        );
        assert_eq!(
            rx.recv().await.expect("recv"),
            ChangeEvent::BatchCompleted {
                kind: EntityKind::Document
            }
        );
    }

    #[test]
    fn test_controllers_persist_across_observations() {
        let hub = LiveQueryHub::new(ChangeBus::new(16));
        hub.item_changed(EntityKind::Setting);
        hub.batch_completed(EntityKind::Setting);
        hub.item_changed(EntityKind::Setting);

        assert_eq!(hub.observation_count(EntityKind::Setting), 3);
        assert_eq!(hub.state(EntityKind::Setting), QueryState::Active);
    }
}
