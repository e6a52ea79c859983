//! Policy-driven retry engine
//!
//! Used by catalog document fetches and artifact downloads. A
//! [`RetryExecutor`] runs an async operation up to `max_attempts` times,
//! sleeping between attempts according to the [`RetryPolicy`] strategy,
//! asking a [`RetryPredicate`] whether an error is worth another attempt and
//! reporting every step to a [`RetryObserver`].
//!
//! ```rust,no_run
//! use zx3dl_core::retry::{RetryExecutor, HttpStatusPredicate, TracingObserver};
//! use zx3dl_core::types::RetryPolicy;
//!
//! # #[derive(Debug)] struct E;
//! # impl std::fmt::Display for E { fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("e") } }
//! # impl zx3dl_core::retry::HttpStatusError for E { fn status_code(&self) -> Option<u16> { Some(503) } }
//! async fn fetch() -> Result<Vec<u8>, E> { Ok(Vec::new()) }
//!
//! # async fn run() {
//! let executor = RetryExecutor::<E, _, _>::new(RetryPolicy::default())
//!     .with_predicate(HttpStatusPredicate::default_http())
//!     .with_observer(TracingObserver::new("download"));
//! let bytes = executor.execute(|| fetch()).await;
//! # }
//! ```
//!
//! [`RetryPolicy`]: crate::types::RetryPolicy

mod error;
mod executor;
mod observer;
mod policy;

pub use error::RetryError;
pub use executor::RetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use policy::{calculate_delay, AlwaysRetry, HttpStatusError, HttpStatusPredicate, RetryPredicate};
