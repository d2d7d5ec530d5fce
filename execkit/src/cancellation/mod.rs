//! Cooperative cancellation.
//!
//! The retry executor checks a [`CancellationToken`] before each attempt
//! and during inter-attempt waits. Timeouts are expressed as cancellation
//! triggered at a deadline, not a separate mechanism.

mod token;

pub use token::CancellationToken;
