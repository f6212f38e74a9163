//! Registration watcher - turns insert events into endpoint registrations.
//!
//! The watcher is the single consumer of the store's insert-event bus. Each
//! committed batch into a watched collection becomes one registration pass
//! over the batch's documents, identical to the pass bootstrap runs over the
//! full collection. Registration therefore never happens inside the insert
//! path itself; inserting and registering are connected only through the
//! queue.
//!
//! The receiver must be subscribed before the inserts it should observe;
//! the bus does not replay events to late subscribers.

use std::collections::HashMap;

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info, warn};

use crate::core::config::{ResourceFamily, WatchedCollection};
use crate::core::db::InsertEvent;

use super::service::DirectoryService;

/// Consumer of insert events that registers sub-resources for watched
/// collections.
pub struct RegistrationWatcher {
    service: DirectoryService,
    families: HashMap<String, ResourceFamily>,
    receiver: Receiver<InsertEvent>,
}

impl RegistrationWatcher {
    /// Create a watcher over the given subscription.
    pub fn new(
        service: DirectoryService,
        watched: &[WatchedCollection],
        receiver: Receiver<InsertEvent>,
    ) -> Self {
        let families = watched
            .iter()
            .map(|entry| (entry.collection.clone(), entry.family.clone()))
            .collect();
        Self {
            service,
            families,
            receiver,
        }
    }

    /// Consume events until the bus closes.
    ///
    /// Registration failures are logged and the loop continues; a lagged
    /// subscription logs the number of dropped batches.
    pub async fn run(mut self) {
        info!(
            "Registration watcher started ({} watched collection(s))",
            self.families.len()
        );
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    self.handle(event);
                }
                Err(RecvError::Lagged(dropped)) => {
                    warn!("Registration watcher lagged, {dropped} insert batch(es) dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("Insert event bus closed, registration watcher stopping");
                    break;
                }
            }
        }
    }

    /// Drain all queued events without waiting.
    ///
    /// Returns the number of endpoints registered.
    pub fn process_pending(&mut self) -> usize {
        let mut registered = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => registered += self.handle(event),
                Err(TryRecvError::Lagged(dropped)) => {
                    warn!("Registration watcher lagged, {dropped} insert batch(es) dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        registered
    }

    fn handle(&self, event: InsertEvent) -> usize {
        let Some(family) = self.families.get(&event.collection) else {
            return 0;
        };

        match self.service.register_documents(&event.documents, family) {
            Ok(count) => {
                if count > 0 {
                    info!(
                        "Registered {} endpoint(s) from insert into '{}'",
                        count, event.collection
                    );
                }
                count
            }
            Err(err) => {
                warn!(
                    "Registration from insert into '{}' failed: {err}",
                    event.collection
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ApiConfig;
    use crate::core::db::{Document, DocumentStore, Filter};
    use crate::domains::resources::{ListQuery, ResourceRegistry};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        value.as_object().expect("document").clone()
    }

    fn facilities_watch() -> Vec<WatchedCollection> {
        vec![WatchedCollection {
            collection: "facilities".to_string(),
            family: ResourceFamily {
                schema: doc(json!({"region": {"type": "string"}})),
                source: "facilities".to_string(),
                key: "region".to_string(),
            },
        }]
    }

    fn service() -> DirectoryService {
        let store = Arc::new(DocumentStore::open_in_memory().expect("store"));
        DirectoryService::new(
            store,
            Arc::new(ResourceRegistry::new()),
            ApiConfig::default(),
        )
    }

    #[test]
    fn test_insert_into_watched_collection_registers_once() {
        let service = service();
        let receiver = service.store().events().subscribe();
        let mut watcher = RegistrationWatcher::new(service.clone(), &facilities_watch(), receiver);

        service
            .store()
            .insert_many(
                "facilities",
                vec![doc(json!({"endpoint": "clinicA", "region": "north"}))],
            )
            .expect("insert");

        assert_eq!(watcher.process_pending(), 1);
        assert!(service.registry().contains("clinicA"));

        // The queue is drained; nothing registers twice.
        assert_eq!(watcher.process_pending(), 0);
    }

    #[test]
    fn test_unwatched_collection_registers_nothing() {
        let service = service();
        let receiver = service.store().events().subscribe();
        let mut watcher = RegistrationWatcher::new(service.clone(), &facilities_watch(), receiver);

        service
            .store()
            .insert_many(
                "requests",
                vec![doc(json!({"endpoint": "clinicA", "region": "north"}))],
            )
            .expect("insert");

        assert_eq!(watcher.process_pending(), 0);
        assert!(service.registry().is_empty());
    }

    #[test]
    fn test_registration_failure_does_not_stop_the_watcher() {
        let service = service();
        let receiver = service.store().events().subscribe();
        let mut watcher = RegistrationWatcher::new(service.clone(), &facilities_watch(), receiver);

        // Lacks the family key field, so registration fails.
        service
            .store()
            .insert_many("facilities", vec![doc(json!({"endpoint": "broken"}))])
            .expect("insert");
        assert_eq!(watcher.process_pending(), 0);

        service
            .store()
            .insert_many(
                "facilities",
                vec![doc(json!({"endpoint": "clinicA", "region": "north"}))],
            )
            .expect("insert");
        assert_eq!(watcher.process_pending(), 1);
    }

    #[test]
    fn test_registered_endpoint_serves_the_seeding_insert() {
        let service = service();
        let receiver = service.store().events().subscribe();
        let mut watcher = RegistrationWatcher::new(service.clone(), &facilities_watch(), receiver);

        service
            .store()
            .insert_many(
                "facilities",
                vec![
                    doc(json!({"endpoint": "clinicA", "region": "north"})),
                    doc(json!({"region": "south"})),
                ],
            )
            .expect("insert");
        watcher.process_pending();

        let page = service
            .find("clinicA", &ListQuery::default())
            .expect("find");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].get("region"), Some(&json!("north")));
    }

    #[tokio::test]
    async fn test_run_loop_registers_live_inserts() {
        let service = service();
        let receiver = service.store().events().subscribe();
        let watcher = RegistrationWatcher::new(service.clone(), &facilities_watch(), receiver);
        let handle = tokio::spawn(watcher.run());

        service
            .store()
            .insert_many(
                "facilities",
                vec![doc(json!({"endpoint": "clinicA", "region": "north"}))],
            )
            .expect("insert");

        let mut registered = false;
        for _ in 0..100 {
            if service.registry().contains("clinicA") {
                registered = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(registered, "watcher did not register the endpoint in time");
        handle.abort();
    }

    #[test]
    fn test_delete_leaves_registration_in_place() {
        let service = service();
        let receiver = service.store().events().subscribe();
        let mut watcher = RegistrationWatcher::new(service.clone(), &facilities_watch(), receiver);

        service
            .store()
            .insert_many(
                "facilities",
                vec![doc(json!({"endpoint": "clinicA", "region": "north"}))],
            )
            .expect("insert");
        watcher.process_pending();

        service
            .store()
            .delete_matching("facilities", &Filter::new())
            .expect("delete");
        assert_eq!(watcher.process_pending(), 0);
        assert!(service.registry().contains("clinicA"));
    }

    #[test]
    fn test_one_filter_per_seed_document() {
        let service = service();
        let receiver = service.store().events().subscribe();
        let mut watcher = RegistrationWatcher::new(service.clone(), &facilities_watch(), receiver);

        service
            .store()
            .insert_many(
                "facilities",
                vec![
                    doc(json!({"endpoint": "clinicA", "region": "north"})),
                    doc(json!({"endpoint": "clinicB", "region": "south"})),
                ],
            )
            .expect("insert");
        assert_eq!(watcher.process_pending(), 2);

        let a = service.registry().get("clinicA").expect("registered");
        let b = service.registry().get("clinicB").expect("registered");
        assert_eq!(a.filter.get("region"), Some(&json!("north")));
        assert_eq!(b.filter.get("region"), Some(&json!("south")));
    }
}
