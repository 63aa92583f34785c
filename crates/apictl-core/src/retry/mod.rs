//! Retry execution engine with policy-based configuration
//!
//! Retries are always explicit: callers choose the policy, the predicate
//! deciding which errors are worth another attempt, and an observer that
//! reports each attempt. A `CancellationToken` can be attached so that a
//! user interrupt stops the loop between attempts and during backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use apictl_core::retry::{RetryExecutor, RetryError, TracingObserver};
//! use apictl_core::types::RetryPolicy;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     RetryExecutor::new(RetryPolicy::default())
//!         .with_observer(TracingObserver::new("download"))
//!         .execute(|| async { Ok("done".to_string()) })
//!         .await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::RetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{
    calculate_delay, AlwaysRetry, ClosurePredicate, HttpStatusPredicate, RetryPredicate,
};
