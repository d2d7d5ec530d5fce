//! Type-keyed event bus with snapshot dispatch.

use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

type ErasedHandler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Identifies a subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct HandlerEntry {
    id: u64,
    handler: ErasedHandler,
}

/// A thread-safe publish/subscribe registry keyed by event type.
///
/// Handlers for an event type are kept in subscription order. `publish`
/// snapshots the handler list under the registry lock, releases the
/// lock, and only then invokes handlers - so a handler may subscribe or
/// unsubscribe (including itself) without corrupting the in-flight
/// dispatch, and a slow handler never blocks unrelated registry calls.
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<HashMap<TypeId, Vec<HandlerEntry>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler for events of type `E`.
    ///
    /// Handlers are invoked in subscription order. The returned id is
    /// the handle for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let erased: ErasedHandler = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });

        self.registry
            .lock()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(HandlerEntry { id, handler: erased });

        SubscriptionId(id)
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        for handlers in registry.values_mut() {
            if let Some(position) = handlers.iter().position(|entry| entry.id == id.0) {
                handlers.remove(position);
                return true;
            }
        }
        false
    }

    /// Publishes an event to all handlers subscribed for its type.
    ///
    /// Dispatch works on a point-in-time snapshot: handlers subscribed
    /// while this call is in flight may or may not see the event, but
    /// every handler registered before the call began is delivered to in
    /// subscription order. A panicking handler is reported and skipped;
    /// it never aborts the publish or affects later handlers. Returns
    /// the number of handlers invoked.
    pub fn publish<E: Any>(&self, event: &E) -> usize {
        let snapshot: Vec<ErasedHandler> = {
            let registry = self.registry.lock();
            registry
                .get(&TypeId::of::<E>())
                .map(|handlers| handlers.iter().map(|entry| entry.handler.clone()).collect())
                .unwrap_or_default()
        };

        for handler in &snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                warn!(
                    event_type = std::any::type_name::<E>(),
                    panic = %crate::errors::panic_message(payload.as_ref()),
                    "event handler panicked; continuing with remaining handlers"
                );
            }
        }
        snapshot.len()
    }

    /// Returns the number of handlers subscribed for `E`.
    #[must_use]
    pub fn subscriber_count<E: Any>(&self) -> usize {
        self.registry
            .lock()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        let total: usize = registry.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("event_types", &registry.len())
            .field("subscriptions", &total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, PartialEq)]
    struct OrderPlaced {
        amount: f64,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OrderShipped {
        tracking: String,
    }

    #[test]
    fn test_delivery_is_type_keyed() {
        let bus = EventBus::new();
        let placed = Arc::new(PlMutex::new(Vec::new()));
        let shipped = Arc::new(PlMutex::new(Vec::new()));

        let placed_log = placed.clone();
        bus.subscribe::<OrderPlaced, _>(move |e| placed_log.lock().push(e.clone()));
        let shipped_log = shipped.clone();
        bus.subscribe::<OrderShipped, _>(move |e| shipped_log.lock().push(e.clone()));

        let delivered = bus.publish(&OrderPlaced { amount: 10.0 });

        assert_eq!(delivered, 1);
        assert_eq!(placed.lock().len(), 1);
        assert!(shipped.lock().is_empty());
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(PlMutex::new(Vec::new()));

        for label in 1..=3 {
            let log = order.clone();
            bus.subscribe::<OrderPlaced, _>(move |_| log.lock().push(label));
        }

        bus.publish(&OrderPlaced { amount: 1.0 });
        assert_eq!(order.lock().clone(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let calls = Arc::new(PlMutex::new(0));

        let log = calls.clone();
        let id = bus.subscribe::<OrderPlaced, _>(move |_| *log.lock() += 1);

        assert_eq!(bus.subscriber_count::<OrderPlaced>(), 1);
        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count::<OrderPlaced>(), 0);

        bus.publish(&OrderPlaced { amount: 1.0 });
        assert_eq!(*calls.lock(), 0);

        // Removing again is a no-op.
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_panicking_handler_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let calls = Arc::new(PlMutex::new(0));

        bus.subscribe::<OrderPlaced, _>(|_| panic!("handler blew up"));
        let log = calls.clone();
        bus.subscribe::<OrderPlaced, _>(move |_| *log.lock() += 1);

        let delivered = bus.publish(&OrderPlaced { amount: 1.0 });

        assert_eq!(delivered, 2);
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_handler_can_unsubscribe_itself_during_publish() {
        let bus = Arc::new(EventBus::new());
        let self_id: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());
        let later_calls = Arc::new(PlMutex::new(0));

        let bus_ref = bus.clone();
        let id_cell = self_id.clone();
        let id = bus.subscribe::<OrderPlaced, _>(move |_| {
            if let Some(id) = id_cell.get() {
                bus_ref.unsubscribe(*id);
            }
        });
        self_id.set(id).ok();

        let log = later_calls.clone();
        bus.subscribe::<OrderPlaced, _>(move |_| *log.lock() += 1);

        // The snapshotted second handler still runs.
        assert_eq!(bus.publish(&OrderPlaced { amount: 1.0 }), 2);
        assert_eq!(*later_calls.lock(), 1);

        // The self-unsubscribed handler is gone for the next publish.
        assert_eq!(bus.publish(&OrderPlaced { amount: 2.0 }), 1);
        assert_eq!(bus.subscriber_count::<OrderPlaced>(), 1);
    }

    #[test]
    fn test_publish_with_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&OrderPlaced { amount: 1.0 }), 0);
    }
}
