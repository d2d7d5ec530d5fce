//! # Execkit
//!
//! Composable execution primitives that interoperate but stay decoupled:
//!
//! - **Specifications**: composable boolean predicates with both a
//!   compiled form and an inspectable AST for external translation
//! - **Staged pipelines**: immutable, incrementally-built sequences of
//!   typed transformations with conditional and validation stages
//! - **Retry execution**: configurable retry-with-backoff around any
//!   fallible operation, blocking or async, with cooperative cancellation
//! - **Event aggregation**: a thread-safe, type-keyed publish/subscribe
//!   bus with snapshot dispatch and per-handler error isolation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use execkit::prelude::*;
//!
//! let eligible = Spec::atom(|o: &Order| o.amount > 100.0, "large order");
//!
//! let pipeline = Pipeline::<Order, Order>::new()
//!     .validate("check_amount", &has_amount, "Order amount must be positive")
//!     .stage_if("apply_discount", &eligible, |o| discounted(o))
//!     .stage("compute_total", |o| totaled(o));
//!
//! let policy = RetryPolicy::new().with_max_attempts(3);
//! let order = policy.execute(|| pipeline.run_safe(order.clone()).map_err(Into::into))?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod retry;
pub mod spec;
pub mod testing;


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::errors::{BoxError, ExecError, ExecutionResult};
    pub use crate::events::{EventBus, SubscriptionId};
    pub use crate::pipeline::{Pipeline, StageKind};
    pub use crate::retry::{RetryPolicy, RetryPolicySnapshot};
    pub use crate::spec::{LeafDescription, Spec, SpecAst};
}
