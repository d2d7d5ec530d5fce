//! Testing utilities.
//!
//! Reusable fixtures for exercising the execution primitives:
//! invocation counters for short-circuit and halting assertions, a flaky
//! operation for retry scenarios, a collecting subscriber for bus
//! assertions, and the illustrative order entity used by the end-to-end
//! scenarios.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::errors::BoxError;

/// A thread-safe invocation counter.
///
/// Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct InvocationCounter {
    count: Arc<AtomicU32>,
}

impl InvocationCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one invocation.
    pub fn record(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the number of recorded invocations.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

/// An operation that fails a fixed number of times, then succeeds.
///
/// On success it returns the total number of calls made.
#[derive(Debug)]
pub struct FlakyOperation {
    remaining_failures: AtomicU32,
    calls: AtomicU32,
}

impl FlakyOperation {
    /// Creates an operation that fails `failures` times before
    /// succeeding.
    #[must_use]
    pub fn failing(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    /// Runs one attempt.
    pub fn invoke(&self) -> Result<u32, BoxError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(format!("transient failure on call {call}").into())
        } else {
            Ok(call)
        }
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Records events received from an [`EventBus`](crate::events::EventBus).
#[derive(Debug, Default)]
pub struct CollectingSubscriber<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E: Clone + Send + 'static> CollectingSubscriber<E> {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a handler closure suitable for `subscribe`.
    pub fn handler(&self) -> impl Fn(&E) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &E| events.lock().push(event.clone())
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<E> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// The illustrative order entity used by the end-to-end scenarios.
///
/// Not part of the library contract; domain fields exist only so the
/// execution primitives have something realistic to chew on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Gross order amount.
    pub amount: f64,
    /// Customer email.
    pub email: String,
    /// Discount applied, if any.
    pub discount: f64,
    /// Tax computed on the discounted amount.
    pub tax: f64,
    /// Final amount after discount and tax.
    pub total: f64,
}

impl Order {
    /// Creates an order with the given amount and email; derived fields
    /// start at zero.
    #[must_use]
    pub fn new(amount: f64, email: impl Into<String>) -> Self {
        Self {
            amount,
            email: email.into(),
            ..Self::default()
        }
    }
}
