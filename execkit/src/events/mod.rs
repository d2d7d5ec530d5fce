//! Event aggregation for decoupled observers.
//!
//! The [`EventBus`] is the integration point through which pipeline and
//! retry outcomes reach logging, metrics, or any other observer without
//! coupling publishers to subscribers. Most applications use one bus for
//! the whole process; [`global`] provides that default instance.

mod bus;

pub use bus::{EventBus, SubscriptionId};

use std::sync::OnceLock;

/// Returns the process-wide default bus.
pub fn global() -> &'static EventBus {
    static GLOBAL_BUS: OnceLock<EventBus> = OnceLock::new();
    GLOBAL_BUS.get_or_init(EventBus::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_bus_is_shared() {
        let first = global() as *const EventBus;
        let second = global() as *const EventBus;
        assert_eq!(first, second);
    }

    #[test]
    fn test_global_bus_dispatches() {
        #[derive(Debug)]
        struct GlobalProbe;

        let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = hits.clone();
        let id = global().subscribe::<GlobalProbe, _>(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        global().publish(&GlobalProbe);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);

        global().unsubscribe(id);
    }
}
