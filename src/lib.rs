//! # rxflow: reactive streams with backpressure
//!
//! Single-threaded reactive streams in which every delivered value is
//! acknowledged. A producer awaits the [`Ack`] returned by `next` before it
//! sends the following value, so a slow consumer paces the whole chain.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxflow::prelude::*;
//! use rxflow::scheduler::TestScheduler;
//!
//! let scheduler = TestScheduler::new();
//! from_iter::<_, _, RxError>(vec![1, 1, 2, 3, 3], scheduler.clone())
//!   .distinct()
//!   .map(|v| v * 10)
//!   .subscribe_next(|v| println!("Value: {v}"));
//! scheduler.run_until_stalled();
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | A description of a stream; every subscription is a fresh execution |
//! | [`Observer`] | Consumes `next`, `error`, and `complete` events |
//! | [`Ack`] | Acknowledgment future returned by `next` |
//! | [`Subscription`] | Handle to cancel an active subscription |
//! | [`Queue`] | Serializes deliveries to one observer |
//! | [`Scheduler`] | Where spawned tasks run and how time passes |
//!
//! ## Feature Flags
//!
//! - **`timer`** (default): [`LocalScheduler`] on a `futures` `LocalPool`
//!   with `futures-time` timers
//! - **`tokio-scheduler`**: `TokioScheduler` for tokio's `LocalSet`
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Ack`]: observer::Ack
//! [`Subscription`]: subscription::Subscription
//! [`Queue`]: queue::Queue
//! [`Scheduler`]: scheduler::Scheduler
//! [`LocalScheduler`]: scheduler::LocalScheduler

pub mod channel;
pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod queue;
pub mod rc;
pub mod scheduler;
pub mod subscriber;
pub mod subscription;

pub use prelude::*;

#[cfg(doctest)]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
